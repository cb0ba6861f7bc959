//! Where a finished video gets attached.

use serde::{Deserialize, Serialize};

/// Course chapter a completed upload is registered against.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TargetContext {
    pub course_id: String,
    pub chapter_id: String,

    /// Resource title. When unset, each file's stem is used.
    pub title: Option<String>,
}

impl TargetContext {
    pub fn new(course_id: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            chapter_id: chapter_id.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title to register for a file whose stem is `stem`.
    pub fn title_for<'a>(&'a self, stem: &'a str) -> &'a str {
        self.title.as_deref().unwrap_or(stem)
    }
}
