//! Session output: directories, artifact names, capture logs and counters.

mod counters;
mod log;
mod paths;

pub use counters::CaptureCounters;
pub use log::CaptureLog;
pub use paths::{session_stamp, Session, PICTURES_DIR, VIDEO_DIR};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while managing session output.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to set permissions on {path}: {source}")]
    Permissions {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write log {path}: {source}")]
    WriteLog {
        path: PathBuf,
        source: std::io::Error,
    },
}
