//! Hardware collaborators: GPIO lines and the tick source.
//!
//! The simulated implementations are always compiled so the rig can be
//! exercised on a development machine; the Raspberry Pi backend is
//! behind the `rpi` feature.

mod clock;
mod gpio;
#[cfg(feature = "rpi")]
mod rpi;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use gpio::{Edge, EdgeCallback, Gpio, GpioError, PinMode, Pull, SimulatedGpio};
#[cfg(feature = "rpi")]
pub use rpi::RpiGpio;
