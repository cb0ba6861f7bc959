//! Core data models for the course video uploader.
//!
//! These types describe the files being uploaded, the in-flight multipart
//! session for each one, the wire shapes exchanged with the course API, and
//! the events the pipeline emits while it works.

pub mod api;
pub mod event;
pub mod local_file;
pub mod target;
pub mod upload_item;
pub mod upload_session;
