//! Metrics collection and registry.

use crate::rig::CaptureMode;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("failed to write metrics: {0}")]
    Io(#[from] std::io::Error),
}

/// Point-in-time copy of the rig counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub pictures: u64,
    pub picture_failures: u64,
    pub videos: u64,
    pub video_failures: u64,
    pub video_frames: u64,
    pub camera_open_failures: u64,
}

/// Prometheus registry holding the rig's capture counters.
///
/// The registry is private to one rig; nothing is exported over the
/// network.
pub struct RigMetrics {
    registry: Registry,

    // Stills
    pictures_total: IntCounter,
    picture_failures_total: IntCounter,

    // Video
    videos_total: IntCounter,
    video_failures_total: IntCounter,
    video_frames_total: IntCounter,

    // Camera
    camera_open_failures_total: IntCounter,

    // State
    capture_mode: IntGauge,
}

impl RigMetrics {
    /// Creates a registry with all rig metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let pictures_total = IntCounter::new(
            "strobe_rig_pictures_total",
            "Still pairs captured with both frames saved",
        )?;
        let picture_failures_total = IntCounter::new(
            "strobe_rig_picture_failures_total",
            "Still sequences that lost at least one frame",
        )?;
        let videos_total = IntCounter::new(
            "strobe_rig_videos_total",
            "Videos finalized with at least one frame",
        )?;
        let video_failures_total = IntCounter::new(
            "strobe_rig_video_failures_total",
            "Video attempts that failed to start or wrote no frames",
        )?;
        let video_frames_total = IntCounter::new(
            "strobe_rig_video_frames_total",
            "Frames written to video files",
        )?;
        let camera_open_failures_total = IntCounter::new(
            "strobe_rig_camera_open_failures_total",
            "Failed attempts to open the camera",
        )?;
        let capture_mode = IntGauge::new(
            "strobe_rig_capture_mode",
            "Current mode (0=idle, 1=still sequence, 2=video sequence)",
        )?;

        registry.register(Box::new(pictures_total.clone()))?;
        registry.register(Box::new(picture_failures_total.clone()))?;
        registry.register(Box::new(videos_total.clone()))?;
        registry.register(Box::new(video_failures_total.clone()))?;
        registry.register(Box::new(video_frames_total.clone()))?;
        registry.register(Box::new(camera_open_failures_total.clone()))?;
        registry.register(Box::new(capture_mode.clone()))?;

        Ok(Self {
            registry,
            pictures_total,
            picture_failures_total,
            videos_total,
            video_failures_total,
            video_frames_total,
            camera_open_failures_total,
            capture_mode,
        })
    }

    /// Records the outcome of a still sequence.
    pub fn record_picture(&self, complete: bool) {
        if complete {
            self.pictures_total.inc();
        } else {
            self.picture_failures_total.inc();
        }
    }

    /// Records the outcome of a video attempt.
    pub fn record_video(&self, frames: u64) {
        if frames > 0 {
            self.videos_total.inc();
            self.video_frames_total.inc_by(frames);
        } else {
            self.video_failures_total.inc();
        }
    }

    pub fn record_camera_open_failure(&self) {
        self.camera_open_failures_total.inc();
    }

    pub fn set_mode(&self, mode: CaptureMode) {
        let value = match mode {
            CaptureMode::Idle => 0,
            CaptureMode::StillSequence(_) => 1,
            CaptureMode::VideoSequence(_) => 2,
        };
        self.capture_mode.set(value);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pictures: self.pictures_total.get(),
            picture_failures: self.picture_failures_total.get(),
            videos: self.videos_total.get(),
            video_failures: self.video_failures_total.get(),
            video_frames: self.video_frames_total.get(),
            camera_open_failures: self.camera_open_failures_total.get(),
        }
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Writes the text encoding to `path`.
    pub fn write_to(&self, path: &std::path::Path) -> Result<(), MetricsError> {
        std::fs::write(path, self.encode()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::StillStep;

    #[test]
    fn test_registry_creation() {
        assert!(RigMetrics::new().is_ok());
    }

    #[test]
    fn test_outcomes_counted() {
        let metrics = RigMetrics::new().unwrap();
        metrics.record_picture(true);
        metrics.record_picture(false);
        metrics.record_video(12);
        metrics.record_video(0);
        metrics.record_camera_open_failure();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                pictures: 1,
                picture_failures: 1,
                videos: 1,
                video_failures: 1,
                video_frames: 12,
                camera_open_failures: 1,
            }
        );
    }

    #[test]
    fn test_metrics_encode() {
        let metrics = RigMetrics::new().unwrap();
        metrics.set_mode(CaptureMode::StillSequence(StillStep::FlashOn));
        metrics.record_video(3);

        let output = metrics.encode().unwrap();
        assert!(output.contains("strobe_rig_capture_mode 1"));
        assert!(output.contains("strobe_rig_video_frames_total 3"));
        assert!(output.contains("strobe_rig_pictures_total 0"));
    }
}
