//! Button wiring between GPIO interrupt callbacks and the control loop.
//!
//! Each physical button gets a [`ButtonWatcher`] that lives inside its
//! edge callback and owns that button's [`Debouncer`]. A confirmed press
//! is posted to a [`ButtonLatch`], which the control loop drains once per
//! tick. The latch is the only state shared between the two contexts.

use super::debounce::Debouncer;
use crate::capture::{PinConfig, TimingConfig};
use crate::hardware::{Clock, Edge, EdgeCallback, Gpio, GpioError, PinMode, Pull};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Single-writer/single-reader flag plus the tick it was raised at.
#[derive(Debug, Default)]
pub struct ButtonLatch {
    pending: AtomicBool,
    at_micros: AtomicU64,
}

impl ButtonLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the latch.
    pub fn post(&self, at: Duration) {
        let micros = u64::try_from(at.as_micros()).unwrap_or(u64::MAX);
        self.at_micros.store(micros, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }

    /// Clears the latch, returning the tick of the press if one was pending.
    pub fn take(&self) -> Option<Duration> {
        if self.pending.swap(false, Ordering::AcqRel) {
            Some(Duration::from_micros(self.at_micros.load(Ordering::Relaxed)))
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Debounces one button from inside its edge callback.
pub struct ButtonWatcher {
    pin: u8,
    active_low: bool,
    debouncer: Debouncer,
    clock: Arc<dyn Clock>,
    gpio: Arc<dyn Gpio>,
    latch: Arc<ButtonLatch>,
}

impl ButtonWatcher {
    pub fn new(
        pin: u8,
        debouncer: Debouncer,
        clock: Arc<dyn Clock>,
        gpio: Arc<dyn Gpio>,
        latch: Arc<ButtonLatch>,
    ) -> Self {
        Self {
            pin,
            active_low: true,
            debouncer,
            clock,
            gpio,
            latch,
        }
    }

    /// Handles one falling edge: waits out the window, then re-samples.
    ///
    /// Blocks the callback context (never the control loop) for the
    /// debounce or hold interval.
    pub fn on_edge(&mut self) {
        let now = self.clock.now();
        let Some(deadline) = self.debouncer.on_falling_edge(now) else {
            tracing::trace!(pin = self.pin, "Edge ignored");
            return;
        };
        self.clock.sleep(deadline.saturating_sub(now));

        let asserted = match self.gpio.read(self.pin) {
            Ok(high) => high != self.active_low,
            Err(e) => {
                tracing::warn!(pin = self.pin, error = %e, "Button sample failed");
                false
            }
        };
        let at = self.clock.now();
        if self.debouncer.resolve(at, asserted) {
            tracing::debug!(pin = self.pin, kind = ?self.debouncer.kind(), "Button press confirmed");
            self.latch.post(at);
        } else {
            tracing::trace!(pin = self.pin, "Press not confirmed");
        }
    }

    /// Moves the watcher into a GPIO edge callback.
    pub fn into_callback(mut self) -> EdgeCallback {
        Box::new(move || self.on_edge())
    }
}

/// Latches for the two rig buttons.
#[derive(Debug, Clone, Default)]
pub struct ButtonLatches {
    /// Still capture (short press).
    pub primary: Arc<ButtonLatch>,
    /// Video toggle (hold).
    pub secondary: Arc<ButtonLatch>,
}

/// Configures both button pins as pulled-up inputs and registers their
/// falling-edge callbacks.
pub fn register_buttons(
    gpio: &Arc<dyn Gpio>,
    clock: &Arc<dyn Clock>,
    pins: &PinConfig,
    timing: &TimingConfig,
) -> Result<ButtonLatches, GpioError> {
    let latches = ButtonLatches::default();
    let buttons = [
        (
            pins.button_primary,
            Debouncer::short(timing.debounce(), timing.rearm_guard()),
            &latches.primary,
        ),
        (
            pins.button_secondary,
            Debouncer::hold(timing.hold(), timing.rearm_guard()),
            &latches.secondary,
        ),
    ];

    for (pin, debouncer, latch) in buttons {
        gpio.set_mode(pin, PinMode::Input(Pull::Up))?;
        let watcher = ButtonWatcher::new(
            pin,
            debouncer,
            Arc::clone(clock),
            Arc::clone(gpio),
            Arc::clone(latch),
        );
        gpio.on_edge(pin, Edge::Falling, watcher.into_callback())?;
        tracing::debug!(pin, "Button registered");
    }
    Ok(latches)
}
