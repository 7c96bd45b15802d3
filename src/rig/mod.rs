//! Capture state machine.
//!
//! [`CaptureRig`] owns the camera, the video writer and the illumination
//! outputs, and advances exactly one step of the current mode per call to
//! [`CaptureRig::on_tick`]. Button presses and overlay actions only move
//! the rig between modes; all camera and file work happens inside a tick.
//!
//! ```text
//!          primary                      tick            tick
//!   Idle ──────────▶ Still(FlashOff) ──────▶ Still(FlashOn) ──────▶ Idle
//!    │
//!    │ secondary        tick (start + frame)       secondary        tick
//!    └──────────▶ Video(Recording) ──▶ ... ──▶ Video(StopRequested) ──▶ Idle
//! ```

mod display;
mod still;
mod video;

pub use display::{ChannelDisplay, Display, HeadlessDisplay, OverlayAction, PreviewStatus};

use crate::capture::{
    AppliedSettings, Camera, CameraError, CameraSettings, CaptureConfig, FileConfig,
    TimingConfig, VideoWriter,
};
use crate::hardware::Clock;
use crate::illumination::IlluminationController;
use crate::input::ButtonLatches;
use crate::metrics::RigMetrics;
use crate::session::{CaptureCounters, Session};
use still::StillShot;
use std::sync::Arc;
use video::Recording;

/// Step of a still sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillStep {
    /// Next tick grabs the unlit frame.
    FlashOff,
    /// Next tick grabs the lit frame.
    FlashOn,
    Complete,
}

/// Sub-state of a video sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoState {
    Recording,
    /// Next tick finalizes the file.
    StopRequested,
}

/// Externally visible rig mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Idle,
    StillSequence(StillStep),
    VideoSequence(VideoState),
}

enum Mode {
    Idle,
    Still(StillShot),
    Video(Recording),
}

/// Hardware and bookkeeping handed to [`CaptureRig::new`].
pub struct RigParts<C, W> {
    pub camera: C,
    pub writer: W,
    pub lights: IlluminationController,
    pub clock: Arc<dyn Clock>,
    pub session: Session,
    pub metrics: RigMetrics,
}

/// The capture controller.
pub struct CaptureRig<C: Camera, W: VideoWriter> {
    camera: C,
    writer: W,
    display: Box<dyn Display>,
    lights: IlluminationController,
    clock: Arc<dyn Clock>,
    session: Session,
    counters: CaptureCounters,
    settings: CameraSettings,
    applied: AppliedSettings,
    capture: CaptureConfig,
    timing: TimingConfig,
    metrics: RigMetrics,
    mode: Mode,
    pending: Vec<OverlayAction>,
    camera_fault: bool,
    quit_requested: bool,
}

impl<C: Camera, W: VideoWriter> CaptureRig<C, W> {
    /// Creates an idle rig. The camera is opened lazily on the first tick.
    pub fn new(parts: RigParts<C, W>, config: &FileConfig) -> Self {
        Self {
            camera: parts.camera,
            writer: parts.writer,
            display: Box::new(HeadlessDisplay),
            lights: parts.lights,
            clock: parts.clock,
            session: parts.session,
            counters: CaptureCounters::new(),
            settings: CameraSettings::default(),
            applied: AppliedSettings::new(),
            capture: config.capture.clone(),
            timing: config.timing.clone(),
            metrics: parts.metrics,
            mode: Mode::Idle,
            pending: Vec::new(),
            camera_fault: false,
            quit_requested: false,
        }
    }

    /// Replaces the preview sink.
    pub fn with_display(mut self, display: Box<dyn Display>) -> Self {
        self.display = display;
        self
    }

    pub fn mode(&self) -> CaptureMode {
        match &self.mode {
            Mode::Idle => CaptureMode::Idle,
            Mode::Still(shot) => CaptureMode::StillSequence(shot.step()),
            Mode::Video(rec) => CaptureMode::VideoSequence(rec.state()),
        }
    }

    #[inline]
    pub fn counters(&self) -> CaptureCounters {
        self.counters
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn lights(&self) -> &IlluminationController {
        &self.lights
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn metrics(&self) -> &RigMetrics {
        &self.metrics
    }

    /// True once the operator asked to quit from the overlay.
    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Frames recorded so far by the active video, if any.
    pub fn video_frames(&self) -> Option<u64> {
        match &self.mode {
            Mode::Video(rec) => Some(rec.frames()),
            _ => None,
        }
    }

    /// Starts a still sequence. Ignored unless idle.
    pub fn on_button_primary(&mut self) -> bool {
        if !matches!(self.mode, Mode::Idle) {
            tracing::debug!(mode = ?self.mode(), "Primary press ignored");
            return false;
        }
        let index = self.counters.picture();
        tracing::info!(index, "Still sequence requested");
        self.mode = Mode::Still(StillShot::new(index));
        true
    }

    /// Starts a recording from idle, or asks a running one to stop.
    pub fn on_button_secondary(&mut self) -> bool {
        if matches!(self.mode, Mode::Idle) {
            let index = self.counters.video();
            tracing::info!(index, "Video sequence requested");
            self.mode = Mode::Video(Recording::new(index));
            return true;
        }
        let accepted = match &mut self.mode {
            Mode::Video(rec) => rec.request_stop(),
            _ => false,
        };
        if accepted {
            tracing::info!("Video stop requested");
        } else {
            tracing::debug!(mode = ?self.mode(), "Secondary press ignored");
        }
        accepted
    }

    /// Dispatches presses posted by the button callbacks since the last call.
    pub fn poll_buttons(&mut self, latches: &ButtonLatches) {
        if let Some(at) = latches.primary.take() {
            tracing::debug!(?at, "Primary press");
            self.on_button_primary();
        }
        if let Some(at) = latches.secondary.take() {
            tracing::debug!(?at, "Secondary hold");
            self.on_button_secondary();
        }
    }

    /// Applies one overlay request.
    pub fn apply_overlay(&mut self, action: OverlayAction) {
        match action {
            OverlayAction::Picture => {
                self.on_button_primary();
            }
            OverlayAction::Video => {
                self.on_button_secondary();
            }
            OverlayAction::Set(kind, value) => {
                let applied = self.settings.set(kind, value);
                tracing::info!(setting = kind.label(), requested = value, applied, "Setting changed");
            }
            OverlayAction::RestoreDefaults => {
                self.settings.restore_defaults();
                tracing::info!("Settings restored to defaults");
            }
            OverlayAction::Quit => {
                tracing::info!("Quit requested");
                self.quit_requested = true;
                if let Mode::Video(rec) = &mut self.mode {
                    rec.request_stop();
                }
            }
        }
    }

    /// Advances the current mode by one step.
    pub fn on_tick(&mut self) {
        let mode = std::mem::replace(&mut self.mode, Mode::Idle);
        self.mode = match mode {
            Mode::Idle => {
                self.tick_idle();
                Mode::Idle
            }
            Mode::Still(shot) => self.step_still(shot),
            Mode::Video(rec) => self.step_video(rec),
        };

        for action in std::mem::take(&mut self.pending) {
            self.apply_overlay(action);
        }
        if self.camera.is_open() {
            self.applied.apply(&self.settings, &mut self.camera);
        }
        self.metrics.set_mode(self.mode());
    }

    /// Ends whatever is in progress and drives every output low.
    ///
    /// A running video is finalized; a half-taken still pair is logged as
    /// incomplete.
    pub fn shutdown(&mut self) {
        let mode = std::mem::replace(&mut self.mode, Mode::Idle);
        match mode {
            Mode::Idle => {}
            Mode::Still(shot) => self.finish_still(shot),
            Mode::Video(rec) => {
                self.stop_video(rec);
            }
        }
        self.lights.all_off();
        self.lights.set_success(false);
        self.camera.release();
        self.metrics.set_mode(CaptureMode::Idle);
        tracing::info!(
            pictures = self.counters.picture(),
            videos = self.counters.video(),
            "Rig shut down"
        );
    }

    fn tick_idle(&mut self) {
        if self.ensure_camera().is_err() {
            let actions = self.display.poll();
            self.pending.extend(actions);
            self.clock.sleep(self.timing.preview_settle());
            return;
        }
        self.clock.sleep(self.timing.preview_settle());
        match self.camera.read_frame() {
            Ok(frame) => {
                let actions = self
                    .display
                    .present(&frame, PreviewStatus::Idle, &self.settings);
                self.pending.extend(actions);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Preview grab failed, reopening camera");
                self.camera.release();
            }
        }
    }

    /// Opens the camera if it is closed.
    ///
    /// Only the first failure in a row is logged at error level.
    fn ensure_camera(&mut self) -> Result<(), CameraError> {
        if self.camera.is_open() {
            return Ok(());
        }
        if let Err(e) = self.camera.open(&self.capture) {
            self.metrics.record_camera_open_failure();
            if self.camera_fault {
                tracing::trace!(error = %e, "Camera still unavailable");
            } else {
                tracing::error!(device = self.capture.device_index, error = %e, "Camera could not be opened");
                self.camera_fault = true;
            }
            return Err(e);
        }
        if self.camera_fault {
            tracing::info!("Camera available again");
            self.camera_fault = false;
        }

        self.clock.sleep(self.timing.open_settle());
        if let Err(e) = self
            .camera
            .set_resolution(self.capture.width, self.capture.height)
        {
            tracing::warn!(error = %e, "Camera resolution not applied");
        }
        self.applied.forget();
        self.applied.apply(&self.settings, &mut self.camera);
        Ok(())
    }
}
