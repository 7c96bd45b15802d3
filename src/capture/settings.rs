//! Adjustable camera settings.
//!
//! Values are edited through the overlay and pushed to the camera only
//! when they differ from what was last applied.

use super::{Camera, CameraControl};
use std::collections::HashMap;
use std::time::Duration;

/// Identifies one adjustable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKind {
    Exposure,
    Brightness,
    Contrast,
    Saturation,
    FramePeriod,
}

impl SettingKind {
    pub const ALL: [SettingKind; 5] = [
        SettingKind::Exposure,
        SettingKind::Brightness,
        SettingKind::Contrast,
        SettingKind::Saturation,
        SettingKind::FramePeriod,
    ];

    /// Human-readable label used in logs and the overlay.
    pub fn label(self) -> &'static str {
        match self {
            SettingKind::Exposure => "Exposure",
            SettingKind::Brightness => "Brightness",
            SettingKind::Contrast => "Contrast",
            SettingKind::Saturation => "Saturation",
            SettingKind::FramePeriod => "Frame period",
        }
    }

    /// Camera control backing this setting; frame period is rig-side only.
    pub fn control(self) -> Option<CameraControl> {
        match self {
            SettingKind::Exposure => Some(CameraControl::Exposure),
            SettingKind::Brightness => Some(CameraControl::Brightness),
            SettingKind::Contrast => Some(CameraControl::Contrast),
            SettingKind::Saturation => Some(CameraControl::Saturation),
            SettingKind::FramePeriod => None,
        }
    }
}

impl std::str::FromStr for SettingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exposure" | "e" => Ok(SettingKind::Exposure),
            "brightness" | "b" => Ok(SettingKind::Brightness),
            "contrast" | "c" => Ok(SettingKind::Contrast),
            "saturation" | "s" => Ok(SettingKind::Saturation),
            "period" | "frame_period" | "f" => Ok(SettingKind::FramePeriod),
            other => Err(format!("unknown setting '{other}'")),
        }
    }
}

/// Integer value constrained to `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedSetting {
    value: i32,
    min: i32,
    max: i32,
    default: i32,
}

impl BoundedSetting {
    pub const fn new(min: i32, max: i32, default: i32) -> Self {
        Self {
            value: default,
            min,
            max,
            default,
        }
    }

    #[inline]
    pub fn value(&self) -> i32 {
        self.value
    }

    /// Stores `value` clamped to the bounds and returns what was stored.
    pub fn set(&mut self, value: i32) -> i32 {
        self.value = value.clamp(self.min, self.max);
        self.value
    }

    pub fn reset(&mut self) {
        self.value = self.default;
    }
}

/// The five settings exposed on the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    exposure: BoundedSetting,
    brightness: BoundedSetting,
    contrast: BoundedSetting,
    saturation: BoundedSetting,
    frame_period: BoundedSetting,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            exposure: BoundedSetting::new(1, 5000, 157),
            brightness: BoundedSetting::new(-64, 64, 0),
            contrast: BoundedSetting::new(0, 64, 32),
            saturation: BoundedSetting::new(0, 128, 64),
            frame_period: BoundedSetting::new(1, 100, 33),
        }
    }
}

impl CameraSettings {
    pub fn get(&self, kind: SettingKind) -> i32 {
        self.setting(kind).value()
    }

    pub fn setting(&self, kind: SettingKind) -> &BoundedSetting {
        match kind {
            SettingKind::Exposure => &self.exposure,
            SettingKind::Brightness => &self.brightness,
            SettingKind::Contrast => &self.contrast,
            SettingKind::Saturation => &self.saturation,
            SettingKind::FramePeriod => &self.frame_period,
        }
    }

    /// Sets a value (clamped) and returns what was stored.
    pub fn set(&mut self, kind: SettingKind, value: i32) -> i32 {
        let setting = match kind {
            SettingKind::Exposure => &mut self.exposure,
            SettingKind::Brightness => &mut self.brightness,
            SettingKind::Contrast => &mut self.contrast,
            SettingKind::Saturation => &mut self.saturation,
            SettingKind::FramePeriod => &mut self.frame_period,
        };
        setting.set(value)
    }

    pub fn restore_defaults(&mut self) {
        self.exposure.reset();
        self.brightness.reset();
        self.contrast.reset();
        self.saturation.reset();
        self.frame_period.reset();
    }

    /// Pacing between recorded video frames.
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.frame_period.value()).unwrap_or(1))
    }

    /// `label: value` lines for capture logs.
    pub fn summary(&self) -> String {
        SettingKind::ALL
            .iter()
            .map(|kind| match kind {
                SettingKind::FramePeriod => format!("Video frame period: {}ms\n", self.get(*kind)),
                _ => format!("{} of camera: {}\n", kind.label(), self.get(*kind)),
            })
            .collect()
    }
}

/// Remembers which control values the camera currently holds.
#[derive(Debug, Default)]
pub struct AppliedSettings {
    applied: HashMap<CameraControl, i32>,
}

impl AppliedSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes every control whose value changed since the last push.
    ///
    /// A failed push is logged and retried on the next call. Returns the
    /// number of controls written.
    pub fn apply<C: Camera>(&mut self, settings: &CameraSettings, camera: &mut C) -> usize {
        let mut written = 0;
        for kind in SettingKind::ALL {
            let Some(control) = kind.control() else {
                continue;
            };
            let value = settings.get(kind);
            if self.applied.get(&control) == Some(&value) {
                continue;
            }
            match camera.set_control(control, value) {
                Ok(()) => {
                    self.applied.insert(control, value);
                    written += 1;
                    tracing::debug!(setting = kind.label(), value, "Applied camera setting");
                }
                Err(e) => {
                    tracing::warn!(setting = kind.label(), value, error = %e, "Failed to apply camera setting");
                }
            }
        }
        written
    }

    /// Forgets applied values, e.g. after the camera was reopened.
    pub fn forget(&mut self) {
        self.applied.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, SimulatedCamera};

    #[test]
    fn test_set_clamps_to_bounds() {
        let mut settings = CameraSettings::default();
        assert_eq!(settings.set(SettingKind::Brightness, 500), 64);
        assert_eq!(settings.set(SettingKind::Brightness, -500), -64);
        assert_eq!(settings.set(SettingKind::FramePeriod, 0), 1);
    }

    #[test]
    fn test_restore_defaults() {
        let mut settings = CameraSettings::default();
        settings.set(SettingKind::Exposure, 10);
        settings.set(SettingKind::Contrast, 1);
        settings.restore_defaults();
        assert_eq!(settings, CameraSettings::default());
    }

    #[test]
    fn test_apply_is_edge_triggered() {
        let mut camera = SimulatedCamera::new();
        camera.open(&CaptureConfig::with_dimensions(8, 6)).unwrap();
        let mut settings = CameraSettings::default();
        let mut applied = AppliedSettings::new();

        assert_eq!(applied.apply(&settings, &mut camera), 4);
        assert_eq!(applied.apply(&settings, &mut camera), 0);

        settings.set(SettingKind::Saturation, 100);
        settings.set(SettingKind::FramePeriod, 50);
        assert_eq!(applied.apply(&settings, &mut camera), 1);
        assert_eq!(camera.control(CameraControl::Saturation), Some(100));

        applied.forget();
        assert_eq!(applied.apply(&settings, &mut camera), 4);
    }

    #[test]
    fn test_failed_apply_is_retried() {
        let mut camera = SimulatedCamera::new();
        let settings = CameraSettings::default();
        let mut applied = AppliedSettings::new();

        // Closed camera rejects controls.
        assert_eq!(applied.apply(&settings, &mut camera), 0);

        camera.open(&CaptureConfig::with_dimensions(8, 6)).unwrap();
        assert_eq!(applied.apply(&settings, &mut camera), 4);
    }

    #[test]
    fn test_summary_lists_every_setting() {
        let summary = CameraSettings::default().summary();
        assert!(summary.contains("Exposure of camera: 157"));
        assert!(summary.contains("Saturation of camera: 64"));
        assert!(summary.contains("Video frame period: 33ms"));
    }
}
