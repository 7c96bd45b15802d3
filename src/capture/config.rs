//! Rig configuration.
//!
//! Everything has a default matching the reference bench rig wiring, so the
//! configuration file is optional and may name only the fields it
//! overrides. The file is read once at startup and never written back.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for camera capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index (`/dev/videoN`).
    pub device_index: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Target frame rate written into video logs and handed to the writer.
    pub fps: f64,
    /// JPEG quality for stills and MJPEG frames (1-100).
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 960,
            height: 720,
            fps: 30.0,
            jpeg_quality: 95,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if !(self.fps > 0.0 && self.fps <= 240.0) {
            return Err(ConfigError::InvalidFrameRate);
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidQuality(self.jpeg_quality));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 0-240 fps)")]
    InvalidFrameRate,
    #[error("invalid JPEG quality {0} (must be 1-100)")]
    InvalidQuality(u8),
    #[error("invalid timing: {0}")]
    InvalidTiming(String),
    #[error("pin {0} is assigned more than once")]
    DuplicatePin(u8),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub pins: PinConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// GPIO assignments (BCM numbering).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    /// Strobe / flash LED bank.
    pub flash: u8,
    /// Recording indicator LED.
    pub recording: u8,
    /// Success indicator LED.
    pub success: u8,
    /// Still-capture button.
    pub button_primary: u8,
    /// Video hold-to-toggle button.
    pub button_secondary: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            flash: 26,
            recording: 20,
            success: 21,
            button_primary: 19,
            button_secondary: 13,
        }
    }
}

impl PinConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let pins = [
            self.flash,
            self.recording,
            self.success,
            self.button_primary,
            self.button_secondary,
        ];
        for (i, pin) in pins.iter().enumerate() {
            if pins[i + 1..].contains(pin) {
                return Err(ConfigError::DuplicatePin(*pin));
            }
        }
        Ok(())
    }
}

/// Timing parameters, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Short-press debounce window.
    pub debounce_ms: u64,
    /// Hold interval for the video button.
    pub hold_ms: u64,
    /// Edges arriving this soon after a press resolves count as bounce.
    pub rearm_guard_ms: u64,
    /// Delay before each still grab.
    pub still_settle_ms: u64,
    /// Delay before each preview grab.
    pub preview_settle_ms: u64,
    /// Delay after opening the camera.
    pub open_settle_ms: u64,
    /// Frames read and dropped before the lit still.
    pub discard_frames: u32,
    /// On/off step of the success blink.
    pub blink_step_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 10,
            hold_ms: 1250,
            rearm_guard_ms: 50,
            still_settle_ms: 1,
            preview_settle_ms: 5,
            open_settle_ms: 1,
            discard_frames: 1,
            blink_step_ms: 500,
        }
    }
}

impl TimingConfig {
    /// Validates the timing parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::InvalidTiming(
                "debounce_ms must be positive".to_owned(),
            ));
        }
        if self.hold_ms <= self.debounce_ms {
            return Err(ConfigError::InvalidTiming(format!(
                "hold_ms ({}) must exceed debounce_ms ({})",
                self.hold_ms, self.debounce_ms
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn rearm_guard(&self) -> Duration {
        Duration::from_millis(self.rearm_guard_ms)
    }

    pub fn still_settle(&self) -> Duration {
        Duration::from_millis(self.still_settle_ms)
    }

    pub fn preview_settle(&self) -> Duration {
        Duration::from_millis(self.preview_settle_ms)
    }

    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }

    pub fn blink_step(&self) -> Duration {
        Duration::from_millis(self.blink_step_ms)
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory under which timestamped session folders are created.
    pub base_dir: PathBuf,
    /// Make session directories writable by every user.
    pub world_writable: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data"),
            world_writable: true,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.pins.validate()?;
        self.timing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(FileConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = CaptureConfig::default();
        config.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [capture]
            width = 640
            height = 480

            [timing]
            hold_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.width, 640);
        assert_eq!(config.capture.fps, 30.0);
        assert_eq!(config.timing.hold(), Duration::from_secs(1));
        assert_eq!(config.timing.debounce_ms, 10);
        assert_eq!(config.pins, PinConfig::default());
    }

    #[test]
    fn test_hold_must_exceed_debounce() {
        let result = FileConfig::from_toml("[timing]\ndebounce_ms = 20\nhold_ms = 20\n");
        assert!(matches!(result, Err(ConfigError::InvalidTiming(_))));
    }

    #[test]
    fn test_duplicate_pins_rejected() {
        let result = FileConfig::from_toml("[pins]\nflash = 19\n");
        assert!(matches!(result, Err(ConfigError::DuplicatePin(19))));
    }

    #[test]
    fn test_parse_error_reported() {
        let result = FileConfig::from_toml("[capture\nwidth = 1");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
