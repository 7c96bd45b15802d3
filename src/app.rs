//! Process lifecycle: startup order, control loop and shutdown.

use crate::capture::{Camera, ConfigError, FileConfig, VideoWriter};
use crate::hardware::{Clock, Gpio, GpioError};
use crate::illumination::IlluminationController;
use crate::input::{register_buttons, ButtonLatches};
use crate::metrics::{MetricsError, RigMetrics};
use crate::rig::{CaptureRig, Display, RigParts};
use crate::session::{Session, SessionError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// File the metrics snapshot is written to inside the session root.
pub const METRICS_FILE: &str = "metrics.prom";

/// Fatal errors raised before the control loop starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
    #[error("failed to install signal handler: {0}")]
    Signal(String),
}

/// Hardware collaborators the application is built from.
pub struct Hardware<C, W> {
    pub gpio: Arc<dyn Gpio>,
    pub clock: Arc<dyn Clock>,
    pub camera: C,
    pub writer: W,
}

/// A started rig plus the button latches feeding it.
pub struct App<C: Camera, W: VideoWriter> {
    rig: CaptureRig<C, W>,
    latches: ButtonLatches,
}

impl<C: Camera, W: VideoWriter> App<C, W> {
    /// Brings the rig up.
    ///
    /// Order: session directories, output pins (driven low), button
    /// callbacks. Any failure here is fatal.
    pub fn init(
        config: &FileConfig,
        hardware: Hardware<C, W>,
        display: Box<dyn Display>,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let Hardware {
            gpio,
            clock,
            camera,
            writer,
        } = hardware;

        let session = Session::create(
            &config.output.base_dir,
            &clock.wall(),
            config.output.world_writable,
        )?;

        let mut lights =
            IlluminationController::new(Arc::clone(&gpio), &config.pins, config.timing.blink_step());
        lights.configure()?;
        let latches = register_buttons(&gpio, &clock, &config.pins, &config.timing)?;
        let metrics = RigMetrics::new()?;

        let rig = CaptureRig::new(
            RigParts {
                camera,
                writer,
                lights,
                clock,
                session,
                metrics,
            },
            config,
        )
        .with_display(display);

        tracing::info!(
            root = %rig.session().root().display(),
            primary = config.pins.button_primary,
            secondary = config.pins.button_secondary,
            "Rig ready"
        );
        Ok(Self { rig, latches })
    }

    /// Dispatches pending button presses, then advances the rig one step.
    pub fn tick(&mut self) {
        self.rig.poll_buttons(&self.latches);
        self.rig.on_tick();
    }

    /// Ticks until `shutdown` is raised or the overlay asks to quit, then
    /// shuts the rig down.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        tracing::info!("Control loop started");
        while !shutdown.load(Ordering::Acquire) && !self.rig.quit_requested() {
            self.tick();
        }
        self.finish();
    }

    /// Ends any active sequence, lowers all outputs and writes the
    /// metrics snapshot.
    pub fn finish(&mut self) {
        self.rig.shutdown();
        let path = self.rig.session().root().join(METRICS_FILE);
        match self.rig.metrics().write_to(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "Metrics written"),
            Err(e) => tracing::warn!(error = %e, "Metrics not written"),
        }
    }

    pub fn rig(&self) -> &CaptureRig<C, W> {
        &self.rig
    }

    pub fn rig_mut(&mut self) -> &mut CaptureRig<C, W> {
        &mut self.rig
    }

    pub fn latches(&self) -> &ButtonLatches {
        &self.latches
    }
}
