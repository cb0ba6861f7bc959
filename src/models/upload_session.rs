//! Represents one file's in-flight multipart transfer and its chunk layout.

use serde::{Deserialize, Serialize};

/// Default chunk size: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Most parts a single multipart upload may have.
pub const MAX_PARTS: u32 = 10_000;

/// One byte range of the source file, uploaded as a single part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkSpec {
    /// Part number (1-based).
    pub part_number: u32,

    /// Offset of the first byte within the file.
    pub offset: u64,

    /// Length in bytes.
    pub len: u64,
}

/// Splits `[0, size_bytes)` into fixed-size chunks in byte order.
#[derive(Clone, Debug)]
pub struct ChunkPlan {
    size_bytes: u64,
    chunk_size: u64,
    next_offset: u64,
    next_part: u32,
}

impl ChunkPlan {
    /// `chunk_size` of zero is treated as one byte so the plan always ends.
    pub fn new(size_bytes: u64, chunk_size: u64) -> Self {
        Self {
            size_bytes,
            chunk_size: chunk_size.max(1),
            next_offset: 0,
            next_part: 1,
        }
    }

    pub fn total_chunks(&self) -> Result<u32, String> {
        total_chunks(self.size_bytes, self.chunk_size)
    }
}

impl Iterator for ChunkPlan {
    type Item = ChunkSpec;

    fn next(&mut self) -> Option<ChunkSpec> {
        // Part number 0 means the counter wrapped; stop rather than repeat.
        if self.next_offset >= self.size_bytes || self.next_part == 0 {
            return None;
        }
        let len = self.chunk_size.min(self.size_bytes - self.next_offset);
        let spec = ChunkSpec {
            part_number: self.next_part,
            offset: self.next_offset,
            len,
        };
        self.next_offset += len;
        self.next_part = self.next_part.wrapping_add(1);
        Some(spec)
    }
}

/// `ceil(size_bytes / chunk_size)`, rejected when it exceeds [`MAX_PARTS`].
pub fn total_chunks(size_bytes: u64, chunk_size: u64) -> Result<u32, String> {
    let chunk_size = chunk_size.max(1);
    let parts = size_bytes.div_ceil(chunk_size);
    match u32::try_from(parts) {
        Ok(parts) if parts <= MAX_PARTS => Ok(parts),
        _ => Err(format!(
            "{} bytes in {}-byte chunks needs {} parts, more than the {} allowed",
            size_bytes, chunk_size, parts, MAX_PARTS
        )),
    }
}

/// A part accepted by storage, as passed to the completion call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,

    /// Integrity tag (ETag) returned by storage for this part.
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// State of one multipart upload attempt.
///
/// Lives only for the duration of a single attempt; nothing is persisted, so
/// an interrupted upload restarts from part 1.
#[derive(Clone, Debug)]
pub struct UploadSession {
    /// Session token issued by storage.
    pub upload_id: String,

    /// Object key the parts are assembled into.
    pub object_key: String,

    pub chunk_size: u64,

    pub total_chunks: u32,

    completed_parts: Vec<CompletedPart>,
}

impl UploadSession {
    pub fn new(
        upload_id: impl Into<String>,
        object_key: impl Into<String>,
        size_bytes: u64,
        chunk_size: u64,
    ) -> Result<Self, String> {
        Ok(Self {
            upload_id: upload_id.into(),
            object_key: object_key.into(),
            chunk_size,
            total_chunks: total_chunks(size_bytes, chunk_size)?,
            completed_parts: Vec::new(),
        })
    }

    /// Part number the session expects next.
    pub fn next_part_number(&self) -> u32 {
        self.completed_parts.len() as u32 + 1
    }

    /// Record an accepted part.
    ///
    /// Parts must arrive contiguously from 1 and never exceed
    /// `total_chunks`; anything else is returned as an error message.
    pub fn record_part(&mut self, part_number: u32, etag: impl Into<String>) -> Result<(), String> {
        let expected = self.next_part_number();
        if part_number != expected {
            return Err(format!(
                "expected part {}, got part {}",
                expected, part_number
            ));
        }
        if part_number > self.total_chunks {
            return Err(format!(
                "part {} exceeds the {} chunks planned",
                part_number, self.total_chunks
            ));
        }
        self.completed_parts.push(CompletedPart {
            part_number,
            etag: etag.into(),
        });
        Ok(())
    }

    pub fn completed_parts(&self) -> &[CompletedPart] {
        &self.completed_parts
    }

    pub fn is_complete(&self) -> bool {
        self.completed_parts.len() as u32 == self.total_chunks
    }

    /// Integer percentage of parts done, in `[0, 100]`.
    pub fn progress(&self) -> u8 {
        if self.total_chunks == 0 {
            return 100;
        }
        (self.completed_parts.len() as u64 * 100 / self.total_chunks as u64) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn total_chunks_rounds_up() {
        assert_eq!(total_chunks(25 * MIB, DEFAULT_CHUNK_SIZE), Ok(3));
        assert_eq!(total_chunks(20 * MIB, DEFAULT_CHUNK_SIZE), Ok(2));
        assert_eq!(total_chunks(1, DEFAULT_CHUNK_SIZE), Ok(1));
        assert_eq!(total_chunks(0, DEFAULT_CHUNK_SIZE), Ok(0));
    }

    #[test]
    fn part_count_is_capped() {
        assert_eq!(total_chunks(10_000, 1), Ok(MAX_PARTS));
        assert!(total_chunks(10_001, 1).is_err());
        // Would wrap to a small number if narrowed with `as u32`.
        assert!(total_chunks(u64::from(u32::MAX) + 2, 1).is_err());
        assert!(UploadSession::new("up", "k", 5 * MIB, 512).is_err());
    }

    #[test]
    fn plan_stops_when_part_numbers_run_out() {
        let mut plan = ChunkPlan::new(u64::MAX, 1);
        plan.next_part = u32::MAX;

        assert_eq!(plan.next().map(|s| s.part_number), Some(u32::MAX));
        assert!(plan.next().is_none());
    }

    #[test]
    fn plan_covers_file_exactly() {
        for (size, chunk) in [(25 * MIB, 10 * MIB), (20 * MIB, 10 * MIB), (7, 3), (1, 5)] {
            let plan = ChunkPlan::new(size, chunk);
            let expected_total = plan.total_chunks().unwrap();
            let specs: Vec<_> = plan.collect();

            assert_eq!(specs.len() as u32, expected_total);
            assert_eq!(specs.iter().map(|s| s.len).sum::<u64>(), size);

            let numbers: Vec<u32> = specs.iter().map(|s| s.part_number).collect();
            assert_eq!(numbers, (1..=expected_total).collect::<Vec<_>>());

            let mut offset = 0;
            for spec in &specs {
                assert_eq!(spec.offset, offset);
                offset += spec.len;
            }
        }
    }

    #[test]
    fn last_chunk_is_remainder_or_full() {
        let lens: Vec<u64> = ChunkPlan::new(25 * MIB, 10 * MIB).map(|s| s.len).collect();
        assert_eq!(lens, vec![10 * MIB, 10 * MIB, 5 * MIB]);

        let lens: Vec<u64> = ChunkPlan::new(20 * MIB, 10 * MIB).map(|s| s.len).collect();
        assert_eq!(lens, vec![10 * MIB, 10 * MIB]);
    }

    #[test]
    fn session_accepts_only_contiguous_parts() {
        let mut session = UploadSession::new("up-1", "videos/a.mp4", 30, 10).unwrap();
        assert_eq!(session.total_chunks, 3);

        session.record_part(1, "e1").unwrap();
        assert!(session.record_part(1, "dup").is_err());
        assert!(session.record_part(3, "skip").is_err());
        session.record_part(2, "e2").unwrap();
        session.record_part(3, "e3").unwrap();
        assert!(session.is_complete());
        assert!(session.record_part(4, "extra").is_err());

        assert_eq!(session.completed_parts().len(), 3);
        assert_eq!(session.progress(), 100);
    }

    #[test]
    fn progress_steps_by_quarters_for_four_chunks() {
        let mut session = UploadSession::new("up", "k", 40, 10).unwrap();
        let mut seen = Vec::new();
        for part in 1..=4 {
            session.record_part(part, format!("e{}", part)).unwrap();
            seen.push(session.progress());
        }
        assert_eq!(seen, vec![25, 50, 75, 100]);
    }

    #[test]
    fn completed_part_serializes_with_storage_field_names() {
        let part = CompletedPart {
            part_number: 2,
            etag: "\"abc\"".into(),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["PartNumber"], 2);
        assert_eq!(json["ETag"], "\"abc\"");
    }
}
