//! Strobed video recording.
//!
//! The strobe toggles before every grab, starting from off, so odd frames
//! are lit and even frames are unlit.

use super::{CaptureRig, Mode, PreviewStatus, VideoState};
use crate::capture::{Camera, VideoCodec, VideoWriter};
use crate::session::{session_stamp, CaptureLog};
use std::time::Duration;

const CODEC: VideoCodec = VideoCodec::Mjpeg;

/// One in-flight video sequence.
pub(super) struct Recording {
    state: VideoState,
    index: u32,
    started: bool,
    frames: u64,
    lit_frames: u64,
    started_at: Duration,
    started_stamp: String,
    log: CaptureLog,
}

impl Recording {
    pub(super) fn new(index: u32) -> Self {
        Self {
            state: VideoState::Recording,
            index,
            started: false,
            frames: 0,
            lit_frames: 0,
            started_at: Duration::ZERO,
            started_stamp: String::new(),
            log: CaptureLog::new(),
        }
    }

    pub(super) fn state(&self) -> VideoState {
        self.state
    }

    pub(super) fn frames(&self) -> u64 {
        self.frames
    }

    /// Returns `false` if a stop was already requested.
    pub(super) fn request_stop(&mut self) -> bool {
        match self.state {
            VideoState::Recording => {
                self.state = VideoState::StopRequested;
                true
            }
            VideoState::StopRequested => false,
        }
    }
}

impl<C: Camera, W: VideoWriter> CaptureRig<C, W> {
    pub(super) fn step_video(&mut self, mut rec: Recording) -> Mode {
        if rec.state == VideoState::StopRequested {
            return self.stop_video(rec);
        }
        if !rec.started {
            if let Err(reason) = self.start_video(&mut rec) {
                return self.abort_video(rec, &reason);
            }
        }
        self.record_frame(rec)
    }

    /// Ends a sequence, whether or not it ever started writing.
    pub(super) fn stop_video(&mut self, rec: Recording) -> Mode {
        if rec.started {
            self.finish_video(rec)
        } else {
            self.abort_video(rec, "stopped before recording started")
        }
    }

    fn start_video(&mut self, rec: &mut Recording) -> Result<(), String> {
        self.lights.set_recording(true);
        self.lights.set_flash(false);
        rec.frames = 0;
        rec.lit_frames = 0;
        rec.log.clear();
        rec.started_at = self.clock.now();
        rec.started_stamp = session_stamp(&self.clock.wall());

        self.ensure_camera().map_err(|e| {
            format!("camera could not be opened for video {}: {e}", rec.index)
        })?;
        let probe = self
            .camera
            .read_frame()
            .map_err(|e| format!("no frame to size video {}: {e}", rec.index))?;

        let path = self.session.video_path(rec.index, CODEC);
        let fps = self.capture.fps;
        self.writer
            .open(&path, CODEC, fps, probe.size())
            .map_err(|e| format!("Could not open the output video file for write: {e}"))?;

        let (width, height) = probe.size();
        rec.log.line(format!(
            "Recording {} ({CODEC}, {fps} fps, {width}x{height})",
            path.display()
        ));
        tracing::info!(index = rec.index, path = %path.display(), "Video recording started");
        rec.started = true;
        Ok(())
    }

    fn record_frame(&mut self, mut rec: Recording) -> Mode {
        let frame_start = self.clock.now();
        let lit = self.lights.toggle_flash();

        let frame = match self.camera.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(index = rec.index, error = %e, "Blank frame, ending video");
                rec.log
                    .line(format!("WARNING: Grabbed blank frame ({e}), ending video"));
                return self.finish_video(rec);
            }
        };
        if let Err(e) = self.writer.write(&frame) {
            tracing::warn!(index = rec.index, error = %e, "Frame not written, ending video");
            rec.log
                .line(format!("Error: frame {} not written: {e}", rec.frames + 1));
            return self.finish_video(rec);
        }
        rec.frames += 1;
        if lit {
            rec.lit_frames += 1;
        }

        let status = PreviewStatus::Recording { frames: rec.frames };
        let actions = self.display.present(&frame, status, &self.settings);
        self.pending.extend(actions);

        self.clock.sleep(self.settings.frame_period());
        let elapsed = self.clock.now().saturating_sub(frame_start);
        rec.log.line(format!(
            "Frame {} time: {}ms, strobe {}",
            rec.frames,
            elapsed.as_millis(),
            if lit { "on" } else { "off" }
        ));
        Mode::Video(rec)
    }

    fn finish_video(&mut self, mut rec: Recording) -> Mode {
        let finalized = match self.writer.release() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(index = rec.index, error = %e, "Video file not finalized");
                rec.log.line(format!("Error: video file not finalized: {e}"));
                false
            }
        };
        let saved = finalized && rec.frames > 0;
        self.camera.release();
        self.lights.all_off();

        let length = self.clock.now().saturating_sub(rec.started_at);
        let path = self.session.video_path(rec.index, CODEC);
        rec.log.blank();
        rec.log.push_block(&self.settings.summary());
        rec.log.line(format!("Frames written: {}", rec.frames));
        rec.log.line(format!("Lit frames: {}", rec.lit_frames));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if saved {
            rec.log.line(format!(
                "File {name} successfully saved to {}",
                self.session.video_dir().display()
            ));
        } else {
            rec.log.line(format!("Error: file {name} holds no playable video"));
        }
        rec.log
            .line(format!("Length of video: {:.3}s", length.as_secs_f64()));
        rec.log
            .line(format!("Date and time of video record: {}", rec.started_stamp));
        rec.log
            .flush_or_warn(&self.session.video_log_path(rec.index));

        if saved {
            self.lights.signal_success();
        }
        let index = self.counters.advance_video();
        self.metrics.record_video(rec.frames);
        tracing::info!(index, frames = rec.frames, ?length, "Video finalized");
        Mode::Idle
    }

    fn abort_video(&mut self, mut rec: Recording, reason: &str) -> Mode {
        tracing::warn!(index = rec.index, reason, "Video not recorded");
        rec.log.line(format!("Error: {reason}"));
        if let Err(e) = self.writer.release() {
            tracing::debug!(error = %e, "Writer release failed");
        }
        self.lights.all_off();
        rec.log
            .flush_or_warn(&self.session.video_log_path(rec.index));

        self.counters.advance_video();
        self.metrics.record_video(0);
        Mode::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::fixture;
    use super::super::{CaptureMode, OverlayAction};
    use super::*;

    #[test]
    fn test_records_until_stopped() {
        let mut f = fixture();
        f.rig.on_tick();
        assert!(f.rig.on_button_secondary());

        for expected in 1..=3u64 {
            f.rig.on_tick();
            assert_eq!(
                f.rig.mode(),
                CaptureMode::VideoSequence(VideoState::Recording)
            );
            assert_eq!(f.rig.video_frames(), Some(expected));
        }
        assert_eq!(f.gpio.level(f.pins.recording), Some(true));
        assert!(f.rig.writer().is_open());

        assert!(f.rig.on_button_secondary());
        f.rig.on_tick();
        assert_eq!(f.rig.mode(), CaptureMode::Idle);
        assert_eq!(f.rig.counters().video(), 1);
        assert!(!f.rig.writer().is_open());
        assert!(!f.rig.camera().is_open());
        assert_eq!(f.gpio.level(f.pins.recording), Some(false));
        assert_eq!(f.gpio.level(f.pins.flash), Some(false));

        let session = f.rig.session().clone();
        let video = std::fs::metadata(session.video_path(0, VideoCodec::Mjpeg)).unwrap();
        assert!(video.len() > 0);
        let log = std::fs::read_to_string(session.video_log_path(0)).unwrap();
        assert!(log.contains("Frames written: 3"));
        assert!(log.contains("Lit frames: 2"));
        assert!(log.contains("Frame 1 time: 33ms, strobe on"));
        assert!(log.contains("Frame 2 time: 33ms, strobe off"));
        assert!(log.contains("Length of video"));

        let snapshot = f.rig.metrics().snapshot();
        assert_eq!(snapshot.videos, 1);
        assert_eq!(snapshot.video_frames, 3);
    }

    #[test]
    fn test_strobe_alternates_from_lit() {
        let mut f = fixture();
        f.rig.on_button_secondary();
        for _ in 0..4 {
            f.rig.on_tick();
        }
        // Configure low, start low, then one toggle per frame.
        assert_eq!(
            f.gpio.writes_to(f.pins.flash),
            vec![false, false, true, false, true, false]
        );
    }

    #[test]
    fn test_blank_frame_finalizes() {
        let mut f = fixture();
        f.rig.on_button_secondary();
        f.rig.on_tick();
        f.rig.camera_mut().fail_next_reads(1);
        f.rig.on_tick();

        assert_eq!(f.rig.mode(), CaptureMode::Idle);
        let log = std::fs::read_to_string(f.rig.session().video_log_path(0)).unwrap();
        assert!(log.contains("WARNING: Grabbed blank frame"));
        assert!(log.contains("Frames written: 1"));
        assert!(log.contains("File 0.avi successfully saved"));
        assert_eq!(f.rig.counters().video(), 1);
    }

    #[test]
    fn test_video_without_frames_is_not_reported_saved() {
        let mut f = fixture();
        f.rig.camera_mut().fail_reads_after(1, 1);
        f.rig.on_button_secondary();
        f.rig.on_tick();

        assert_eq!(f.rig.mode(), CaptureMode::Idle);
        assert_eq!(f.rig.counters().video(), 1);
        let log = std::fs::read_to_string(f.rig.session().video_log_path(0)).unwrap();
        assert!(log.contains("Frames written: 0"));
        assert!(!log.contains("successfully saved"));
        assert!(log.contains("Error: file 0.avi holds no playable video"));
        assert!(!f.rig.lights().is_blinking());
        assert!(!f.gpio.writes_to(f.pins.success).contains(&true));
    }

    #[test]
    fn test_writer_open_failure_returns_to_idle() {
        let mut f = fixture();
        std::fs::remove_dir_all(f.rig.session().video_dir()).unwrap();

        f.rig.on_button_secondary();
        f.rig.on_tick();
        assert_eq!(f.rig.mode(), CaptureMode::Idle);
        assert_eq!(f.rig.counters().video(), 1);
        assert_eq!(f.gpio.level(f.pins.recording), Some(false));
        assert_eq!(f.rig.metrics().snapshot().video_failures, 1);
        assert!(!f.rig.lights().is_blinking());
    }

    #[test]
    fn test_stop_before_first_tick_records_nothing() {
        let mut f = fixture();
        f.rig.on_button_secondary();
        f.rig.on_button_secondary();
        f.rig.on_tick();

        assert_eq!(f.rig.mode(), CaptureMode::Idle);
        assert_eq!(f.rig.counters().video(), 1);
        let log = std::fs::read_to_string(f.rig.session().video_log_path(0)).unwrap();
        assert!(log.contains("stopped before recording started"));
    }

    #[test]
    fn test_overlay_video_action_stops_recording() {
        let mut f = fixture();
        f.rig.on_button_secondary();
        f.rig.on_tick();
        f.rig.apply_overlay(OverlayAction::Picture);
        assert_eq!(
            f.rig.mode(),
            CaptureMode::VideoSequence(VideoState::Recording)
        );
        f.rig.apply_overlay(OverlayAction::Video);
        f.rig.on_tick();
        assert_eq!(f.rig.mode(), CaptureMode::Idle);
        assert_eq!(f.rig.counters(), {
            let mut expected = crate::session::CaptureCounters::new();
            expected.advance_video();
            expected
        });
    }

    #[test]
    fn test_shutdown_finalizes_recording() {
        let mut f = fixture();
        f.rig.on_button_secondary();
        f.rig.on_tick();
        f.rig.on_tick();
        f.rig.shutdown();

        assert_eq!(f.rig.counters().video(), 1);
        let log = std::fs::read_to_string(f.rig.session().video_log_path(0)).unwrap();
        assert!(log.contains("Frames written: 2"));
        assert_eq!(f.gpio.level(f.pins.recording), Some(false));
    }
}
