//! Per-capture text log.

use super::SessionError;
use std::fmt::Write as _;
use std::path::Path;

/// Accumulates human-readable lines describing one capture action.
///
/// Nothing touches the disk until [`CaptureLog::flush`], which replaces
/// the target file with everything accumulated so far.
#[derive(Debug, Default, Clone)]
pub struct CaptureLog {
    text: String,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one line.
    pub fn line(&mut self, entry: impl std::fmt::Display) {
        // Writing into a String cannot fail.
        let _ = writeln!(self.text, "{entry}");
    }

    /// Appends pre-formatted text verbatim.
    pub fn push_block(&mut self, block: &str) {
        self.text.push_str(block);
    }

    /// Appends an empty line.
    pub fn blank(&mut self) {
        self.text.push('\n');
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Writes the accumulated text to `path`.
    pub fn flush(&self, path: &Path) -> Result<(), SessionError> {
        std::fs::write(path, &self.text).map_err(|source| SessionError::WriteLog {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`CaptureLog::flush`], but a failure is only reported.
    pub fn flush_or_warn(&self, path: &Path) -> bool {
        match self.flush(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Capture log not saved");
                false
            }
        }
    }
}
