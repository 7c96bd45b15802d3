//! Strobe Rig Library
//!
//! Drives a single-board-computer capture rig: two push buttons, a strobe
//! light bank, two indicator LEDs and a USB camera. A short press on the
//! primary button takes an unlit/lit still pair; holding the secondary
//! button starts or stops a strobed video in which consecutive frames
//! alternate between lit and unlit.
//!
//! # Architecture
//!
//! ```text
//! GPIO edge ─▶ input (debounce) ─▶ latch ─┐
//!                                         ▼
//!                      app loop ─▶ rig (state machine) ─▶ capture (camera, writer)
//!                                         │                   │
//!                                         ▼                   ▼
//!                                   illumination           session (paths, logs)
//! ```
//!
//! Button callbacks never touch the camera: they only post to a latch the
//! control loop drains. All camera and file work happens on the loop
//! thread, one step per tick.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strobe_rig::{
//!     capture::{AviWriter, FileConfig, SimulatedCamera},
//!     hardware::{Clock, Gpio, MonotonicClock, SimulatedGpio},
//!     app::{App, Hardware},
//!     rig::HeadlessDisplay,
//! };
//!
//! let config = FileConfig::default();
//! let hardware = Hardware {
//!     gpio: Arc::new(SimulatedGpio::new()) as Arc<dyn Gpio>,
//!     clock: Arc::new(MonotonicClock::new()) as Arc<dyn Clock>,
//!     camera: SimulatedCamera::new(),
//!     writer: AviWriter::new(config.capture.jpeg_quality),
//! };
//! let mut app = App::init(&config, hardware, Box::new(HeadlessDisplay)).unwrap();
//!
//! app.rig_mut().on_button_primary();
//! app.tick();
//! app.tick();
//! app.finish();
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod app;
pub mod capture;
pub mod hardware;
pub mod illumination;
pub mod input;
pub mod metrics;
pub mod rig;
pub mod session;

// Re-export commonly used types at crate root
pub use app::{App, Hardware, StartupError};
pub use capture::{Camera, CaptureConfig, FileConfig, Frame, SimulatedCamera, VideoWriter};
pub use hardware::{Clock, Gpio, ManualClock, MonotonicClock, SimulatedGpio};
pub use rig::{CaptureMode, CaptureRig, StillStep, VideoState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
