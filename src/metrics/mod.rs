//! Capture counters in Prometheus text format.
//!
//! # Metrics
//!
//! - `strobe_rig_pictures_total` - Still pairs with both frames saved
//! - `strobe_rig_picture_failures_total` - Still sequences that lost a frame
//! - `strobe_rig_videos_total` - Videos finalized with at least one frame
//! - `strobe_rig_video_failures_total` - Video attempts that recorded nothing
//! - `strobe_rig_video_frames_total` - Frames written to video files
//! - `strobe_rig_camera_open_failures_total` - Failed camera opens
//! - `strobe_rig_capture_mode` - Current mode (0=idle, 1=still, 2=video)
//!
//! The application writes the encoded registry to `metrics.prom` in the
//! session root on shutdown.

mod collector;

pub use collector::{MetricsError, MetricsSnapshot, RigMetrics};
