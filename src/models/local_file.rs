//! A locally selected file and a sequential reader over its chunks.

use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncReadExt,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Where the bytes of a [`LocalFile`] live.
#[derive(Clone, Debug)]
enum FileSource {
    Disk(PathBuf),
    Memory(Bytes),
}

/// A file selected for upload.
///
/// Size and content type are fixed when the file is selected; the bytes are
/// only read while the pipeline is transferring it.
#[derive(Clone, Debug)]
pub struct LocalFile {
    /// File name as shown to the user and sent to the API.
    pub name: String,

    /// MIME type sent with the initiate call and every chunk transfer.
    pub content_type: String,

    /// Total size in bytes.
    pub size_bytes: u64,

    source: FileSource,
}

impl LocalFile {
    /// Stat a file on disk and guess its content type from the extension.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            content_type: content_type_for(&name).to_string(),
            name,
            size_bytes: meta.len(),
            source: FileSource::Disk(path.to_path_buf()),
        })
    }

    /// Wrap bytes already held in memory.
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Path on disk, if this file is backed by one.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Disk(path) => Some(path),
            FileSource::Memory(_) => None,
        }
    }

    /// File name without its extension, used as the default resource title.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    /// Open a reader positioned at the first byte.
    ///
    /// The returned reader holds the file handle; dropping it releases the
    /// handle.
    pub async fn reader(&self) -> io::Result<ChunkReader> {
        match &self.source {
            FileSource::Disk(path) => Ok(ChunkReader::Disk(File::open(path).await?)),
            FileSource::Memory(bytes) => Ok(ChunkReader::Memory {
                bytes: bytes.clone(),
                pos: 0,
            }),
        }
    }
}

/// Reads consecutive chunks from the start of a [`LocalFile`].
pub enum ChunkReader {
    Disk(File),
    Memory { bytes: Bytes, pos: usize },
}

impl ChunkReader {
    /// Read exactly `len` bytes. A file that shrank since it was selected
    /// surfaces as `UnexpectedEof`.
    pub async fn next_chunk(&mut self, len: usize) -> io::Result<Bytes> {
        match self {
            ChunkReader::Disk(file) => {
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
            ChunkReader::Memory { bytes, pos } => {
                let end = pos.checked_add(len).filter(|end| *end <= bytes.len());
                match end {
                    Some(end) => {
                        let chunk = bytes.slice(*pos..end);
                        *pos = end;
                        Ok(chunk)
                    }
                    None => Err(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "source ended before the expected chunk length",
                    )),
                }
            }
        }
    }
}

/// Guess a MIME type from a file name. Anything unknown is sent as an
/// opaque octet stream.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mpeg" | "mpg" => "video/mpeg",
        "ogv" => "video/ogg",
        "ts" => "video/mp2t",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
