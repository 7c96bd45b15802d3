//! Timestamped session directories.
//!
//! ```text
//! <base>/<YYYY_MM_DD_HHhMMmSSs>/
//!     pictures/<index>/<index>_flash_off.jpg
//!     pictures/<index>/<index>_flash_on.jpg
//!     pictures/<index>/<index>_log.txt
//!     video/<index>.avi
//!     video/<index>_log.txt
//! ```

use super::SessionError;
use crate::capture::{VideoCodec, STILL_EXTENSION};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

pub const PICTURES_DIR: &str = "pictures";
pub const VIDEO_DIR: &str = "video";

/// Formats a wall-clock time as `YYYY_MM_DD_HHhMMmSSs`.
pub fn session_stamp(now: &NaiveDateTime) -> String {
    now.format("%Y_%m_%d_%Hh%Mm%Ss").to_string()
}

/// Output destination for one program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    root: PathBuf,
    pictures: PathBuf,
    video: PathBuf,
    world_writable: bool,
}

impl Session {
    /// Creates `<base>/<stamp>/{pictures,video}`.
    pub fn create(
        base: &Path,
        now: &NaiveDateTime,
        world_writable: bool,
    ) -> Result<Self, SessionError> {
        let root = base.join(session_stamp(now));
        let session = Self {
            pictures: root.join(PICTURES_DIR),
            video: root.join(VIDEO_DIR),
            root,
            world_writable,
        };

        for dir in [&session.pictures, &session.video] {
            std::fs::create_dir_all(dir).map_err(|source| SessionError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        for dir in [&session.root, &session.pictures, &session.video] {
            session.open_permissions(dir)?;
        }

        tracing::info!(root = %session.root.display(), "Session directories created");
        Ok(session)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pictures_dir(&self) -> &Path {
        &self.pictures
    }

    pub fn video_dir(&self) -> &Path {
        &self.video
    }

    /// Directory holding the still pair for `index`.
    pub fn picture_dir(&self, index: u32) -> PathBuf {
        self.pictures.join(index.to_string())
    }

    /// Creates the per-shot directory for `index`.
    pub fn create_picture_dir(&self, index: u32) -> Result<PathBuf, SessionError> {
        let dir = self.picture_dir(index);
        std::fs::create_dir_all(&dir).map_err(|source| SessionError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        self.open_permissions(&dir)?;
        Ok(dir)
    }

    /// Still image path for `index`, lit or unlit.
    pub fn still_path(&self, index: u32, lit: bool) -> PathBuf {
        let suffix = if lit { "flash_on" } else { "flash_off" };
        self.picture_dir(index)
            .join(format!("{index}_{suffix}.{STILL_EXTENSION}"))
    }

    pub fn picture_log_path(&self, index: u32) -> PathBuf {
        self.picture_dir(index).join(format!("{index}_log.txt"))
    }

    pub fn video_path(&self, index: u32, codec: VideoCodec) -> PathBuf {
        self.video.join(format!("{index}.{}", codec.extension()))
    }

    pub fn video_log_path(&self, index: u32) -> PathBuf {
        self.video.join(format!("{index}_log.txt"))
    }

    #[cfg(unix)]
    fn open_permissions(&self, dir: &Path) -> Result<(), SessionError> {
        use std::os::unix::fs::PermissionsExt;

        if !self.world_writable {
            return Ok(());
        }
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o777)).map_err(|source| {
            SessionError::Permissions {
                path: dir.to_path_buf(),
                source,
            }
        })
    }

    #[cfg(not(unix))]
    fn open_permissions(&self, _dir: &Path) -> Result<(), SessionError> {
        Ok(())
    }
}
