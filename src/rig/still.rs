//! Unlit/lit still pair.

use super::{CaptureRig, Mode, StillStep};
use crate::capture::{save_still, Camera, VideoWriter};
use crate::session::{session_stamp, CaptureLog};
use std::time::Duration;

/// One in-flight still sequence.
pub(super) struct StillShot {
    step: StillStep,
    index: u32,
    saved: u8,
    unlit_at: Option<Duration>,
    log: CaptureLog,
}

impl StillShot {
    pub(super) fn new(index: u32) -> Self {
        Self {
            step: StillStep::FlashOff,
            index,
            saved: 0,
            unlit_at: None,
            log: CaptureLog::new(),
        }
    }

    pub(super) fn step(&self) -> StillStep {
        self.step
    }
}

impl<C: Camera, W: VideoWriter> CaptureRig<C, W> {
    pub(super) fn step_still(&mut self, shot: StillShot) -> Mode {
        match shot.step {
            StillStep::FlashOff => self.still_unlit(shot),
            StillStep::FlashOn => {
                self.still_lit(shot);
                self.reopen_camera();
                Mode::Idle
            }
            StillStep::Complete => {
                self.finish_still(shot);
                Mode::Idle
            }
        }
    }

    fn still_unlit(&mut self, mut shot: StillShot) -> Mode {
        if let Err(e) = self.session.create_picture_dir(shot.index) {
            tracing::warn!(index = shot.index, error = %e, "Picture directory unavailable");
            shot.log.line(format!("Error: {e}"));
        }

        // Stills always start from a freshly opened device.
        self.camera.release();
        if let Err(e) = self.ensure_camera() {
            shot.log.line(format!(
                "Error: camera could not be opened for picture {}: {e}",
                shot.index
            ));
            self.finish_still(shot);
            return Mode::Idle;
        }

        self.clock.sleep(self.timing.still_settle());
        self.grab_still(&mut shot, false);
        shot.unlit_at = Some(self.clock.now());

        self.lights.set_flash(true);
        shot.step = StillStep::FlashOn;
        Mode::Still(shot)
    }

    fn still_lit(&mut self, mut shot: StillShot) {
        self.clock.sleep(self.timing.still_settle());
        // The first frames after the strobe rises may predate it.
        for _ in 0..self.timing.discard_frames {
            if let Err(e) = self.camera.read_frame() {
                tracing::debug!(error = %e, "Discard grab failed");
            }
            self.clock.sleep(self.timing.still_settle());
        }
        self.grab_still(&mut shot, true);

        if let Some(unlit_at) = shot.unlit_at {
            let gap = self.clock.now().saturating_sub(unlit_at);
            shot.log.line(format!(
                "Time distance between camera shots: {:.3}s",
                gap.as_secs_f64()
            ));
        }
        shot.step = StillStep::Complete;
        self.finish_still(shot);
    }

    fn grab_still(&mut self, shot: &mut StillShot, lit: bool) {
        let path = self.session.still_path(shot.index, lit);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = self.session.picture_dir(shot.index);
        let stamp = session_stamp(&self.clock.wall());

        match self.camera.read_frame() {
            Ok(frame) => match save_still(&frame, &path, self.capture.jpeg_quality) {
                Ok(()) => {
                    shot.saved += 1;
                    tracing::debug!(path = %path.display(), "Still saved");
                    shot.log.line(format!(
                        "Image: {name} successfully saved to {} at {stamp}",
                        dir.display()
                    ));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Still not saved");
                    shot.log.line(format!(
                        "Error: Image: {name} could not be saved to {} at {stamp}: {e}",
                        dir.display()
                    ));
                }
            },
            Err(e) => {
                tracing::warn!(index = shot.index, lit, error = %e, "Still grab failed");
                shot.log.line(format!(
                    "Error: Image: {name} could not be captured at {stamp}: {e}"
                ));
            }
        }
    }

    /// Writes the shot log, lowers the strobe and consumes the index.
    pub(super) fn finish_still(&mut self, mut shot: StillShot) {
        let complete = shot.saved == 2;
        shot.log.blank();
        shot.log.push_block(&self.settings.summary());
        shot.log
            .flush_or_warn(&self.session.picture_log_path(shot.index));

        self.lights.set_flash(false);
        let index = self.counters.advance_picture();
        self.metrics.record_picture(complete);
        if complete {
            self.lights.signal_success();
            tracing::info!(index, "Still pair saved");
        } else {
            tracing::warn!(index, saved = shot.saved, "Still sequence incomplete");
        }
    }

    fn reopen_camera(&mut self) {
        self.camera.release();
        if self.ensure_camera().is_err() {
            tracing::debug!("Preview will retry the camera");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::fixture;
    use super::super::CaptureMode;
    use super::*;
    use std::time::Instant;

    fn wait_for_blink(f: &super::super::tests::Fixture) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while f.rig.lights().is_blinking() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_still_pair_takes_two_ticks() {
        let mut f = fixture();
        f.rig.on_tick();
        assert!(f.rig.on_button_primary());

        f.rig.on_tick();
        assert_eq!(
            f.rig.mode(),
            CaptureMode::StillSequence(StillStep::FlashOn)
        );
        assert_eq!(f.gpio.level(f.pins.flash), Some(true));
        let session = f.rig.session().clone();
        assert!(session.still_path(0, false).is_file());
        assert!(!session.still_path(0, true).exists());

        f.rig.on_tick();
        assert_eq!(f.rig.mode(), CaptureMode::Idle);
        assert_eq!(f.gpio.level(f.pins.flash), Some(false));
        assert!(session.still_path(0, true).is_file());
        assert_eq!(f.rig.counters().picture(), 1);
        assert!(f.rig.camera().is_open());

        let log = std::fs::read_to_string(session.picture_log_path(0)).unwrap();
        assert_eq!(log.matches("successfully saved").count(), 2);
        assert!(log.contains("0_flash_off.jpg"));
        assert!(log.contains("0_flash_on.jpg"));
        assert!(log.contains("Time distance between camera shots"));
        assert!(log.contains("Exposure of camera: 157"));
        assert_eq!(f.rig.metrics().snapshot().pictures, 1);

        wait_for_blink(&f);
        assert_eq!(
            f.gpio.writes_to(f.pins.success),
            vec![false, true, false, true, false]
        );
    }

    #[test]
    fn test_unlit_grab_failure_keeps_sequence_going() {
        let mut f = fixture();
        f.rig.on_button_primary();
        f.rig.camera_mut().fail_next_reads(1);

        f.rig.on_tick();
        assert_eq!(
            f.rig.mode(),
            CaptureMode::StillSequence(StillStep::FlashOn)
        );
        f.rig.on_tick();
        assert_eq!(f.rig.mode(), CaptureMode::Idle);
        assert_eq!(f.rig.counters().picture(), 1);

        let session = f.rig.session().clone();
        assert!(!session.still_path(0, false).exists());
        assert!(session.still_path(0, true).is_file());
        let log = std::fs::read_to_string(session.picture_log_path(0)).unwrap();
        assert!(log.contains("Error: Image: 0_flash_off.jpg could not be captured"));
        assert_eq!(f.rig.metrics().snapshot().picture_failures, 1);
        assert!(!f.rig.lights().is_blinking());
        assert_eq!(f.gpio.writes_to(f.pins.success), vec![false]);
    }

    #[test]
    fn test_camera_open_failure_aborts_to_idle() {
        let mut f = fixture();
        f.rig.on_button_primary();
        f.rig.camera_mut().fail_next_opens(1);

        f.rig.on_tick();
        assert_eq!(f.rig.mode(), CaptureMode::Idle);
        assert_eq!(f.rig.counters().picture(), 1);
        assert_eq!(f.gpio.level(f.pins.flash), Some(false));

        let log = std::fs::read_to_string(f.rig.session().picture_log_path(0)).unwrap();
        assert!(log.contains("Error: camera could not be opened for picture 0"));

        // The next sequence gets a fresh index.
        f.rig.on_button_primary();
        f.rig.on_tick();
        f.rig.on_tick();
        assert_eq!(f.rig.counters().picture(), 2);
        assert!(f.rig.session().still_path(1, true).is_file());
    }

    #[test]
    fn test_still_reopens_camera_per_sequence() {
        let mut f = fixture();
        f.rig.on_tick();
        assert_eq!(f.rig.camera().open_count(), 1);

        f.rig.on_button_primary();
        f.rig.on_tick();
        f.rig.on_tick();
        // Reopened before the unlit frame and again after the lit one.
        assert_eq!(f.rig.camera().open_count(), 3);
    }
}
