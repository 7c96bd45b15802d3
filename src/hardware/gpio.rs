//! GPIO abstraction.
//!
//! The rig only needs four operations from the GPIO layer: configure a
//! pin, drive an output, sample an input and register an edge callback.
//! Callbacks run on an execution context owned by the implementation and
//! must be treated as concurrent with the control loop.

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur during GPIO operations.
#[derive(Debug, Error)]
pub enum GpioError {
    #[error("failed to initialize GPIO: {0}")]
    InitFailed(String),
    #[error("pin {0} is not available")]
    PinUnavailable(u8),
    #[error("pin {pin} is not configured as {expected}")]
    WrongMode { pin: u8, expected: &'static str },
    #[error("failed to register edge callback on pin {pin}: {reason}")]
    CallbackFailed { pin: u8, reason: String },
}

/// Internal resistor configuration for an input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
    Off,
}

/// Pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input(Pull),
    Output,
}

/// Signal edge that triggers a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    fn matches(self, from_high: bool, to_high: bool) -> bool {
        match self {
            Edge::Rising => !from_high && to_high,
            Edge::Falling => from_high && !to_high,
            Edge::Both => from_high != to_high,
        }
    }
}

/// Callback invoked from the GPIO layer's interrupt context.
pub type EdgeCallback = Box<dyn FnMut() + Send + 'static>;

/// Trait for GPIO implementations.
///
/// All methods take `&self` so a single instance can be shared between
/// the control loop, the success-blink worker and interrupt callbacks.
pub trait Gpio: Send + Sync {
    /// Configures the direction (and pull resistor) of a pin.
    fn set_mode(&self, pin: u8, mode: PinMode) -> Result<(), GpioError>;

    /// Drives an output pin high (`true`) or low (`false`).
    fn write(&self, pin: u8, high: bool) -> Result<(), GpioError>;

    /// Samples the current level of a pin.
    fn read(&self, pin: u8) -> Result<bool, GpioError>;

    /// Registers `callback` to run whenever `edge` is seen on `pin`.
    fn on_edge(&self, pin: u8, edge: Edge, callback: EdgeCallback) -> Result<(), GpioError>;
}

#[derive(Debug, Clone, Copy)]
struct SimPin {
    mode: PinMode,
    high: bool,
}

/// In-memory GPIO used by tests and `--simulate`.
///
/// Records every output write and fires registered callbacks
/// synchronously from [`SimulatedGpio::set_level`].
#[derive(Default)]
pub struct SimulatedGpio {
    pins: Mutex<HashMap<u8, SimPin>>,
    writes: Mutex<Vec<(u8, bool)>>,
    callbacks: Mutex<HashMap<u8, Vec<(Edge, EdgeCallback)>>>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the level seen on an input pin, firing matching callbacks.
    pub fn set_level(&self, pin: u8, high: bool) {
        let previous = {
            let mut pins = lock(&self.pins);
            let entry = pins.entry(pin).or_insert(SimPin {
                mode: PinMode::Input(Pull::Off),
                high,
            });
            std::mem::replace(&mut entry.high, high)
        };

        // Fired outside the lock so a callback may drive pins itself.
        // Edges it causes on this same pin are not re-delivered to it.
        let Some(mut registered) = lock(&self.callbacks).remove(&pin) else {
            return;
        };
        for (edge, callback) in registered.iter_mut() {
            if edge.matches(previous, high) {
                callback();
            }
        }
        let mut callbacks = lock(&self.callbacks);
        let added = callbacks.remove(&pin).unwrap_or_default();
        registered.extend(added);
        callbacks.insert(pin, registered);
    }

    /// Pulls an active-low button line to ground.
    pub fn press(&self, pin: u8) {
        self.set_level(pin, false);
    }

    /// Releases an active-low button line.
    pub fn release(&self, pin: u8) {
        self.set_level(pin, true);
    }

    /// Current level of a pin, `None` if it was never touched.
    pub fn level(&self, pin: u8) -> Option<bool> {
        lock(&self.pins).get(&pin).map(|p| p.high)
    }

    /// Configured mode of a pin.
    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        lock(&self.pins).get(&pin).map(|p| p.mode)
    }

    /// All output writes in order.
    pub fn writes(&self) -> Vec<(u8, bool)> {
        lock(&self.writes).clone()
    }

    /// Output writes to one pin, in order.
    pub fn writes_to(&self, pin: u8) -> Vec<bool> {
        lock(&self.writes)
            .iter()
            .filter(|(p, _)| *p == pin)
            .map(|(_, high)| *high)
            .collect()
    }

    /// Number of callbacks registered on a pin.
    pub fn callback_count(&self, pin: u8) -> usize {
        lock(&self.callbacks).get(&pin).map_or(0, Vec::len)
    }
}

impl Gpio for SimulatedGpio {
    fn set_mode(&self, pin: u8, mode: PinMode) -> Result<(), GpioError> {
        let high = match mode {
            PinMode::Input(Pull::Up) => true,
            PinMode::Input(_) | PinMode::Output => false,
        };
        lock(&self.pins).insert(pin, SimPin { mode, high });
        Ok(())
    }

    fn write(&self, pin: u8, high: bool) -> Result<(), GpioError> {
        {
            let mut pins = lock(&self.pins);
            match pins.get_mut(&pin) {
                Some(p) if p.mode == PinMode::Output => p.high = high,
                Some(_) => {
                    return Err(GpioError::WrongMode {
                        pin,
                        expected: "output",
                    })
                }
                None => return Err(GpioError::PinUnavailable(pin)),
            }
        }
        lock(&self.writes).push((pin, high));
        Ok(())
    }

    fn read(&self, pin: u8) -> Result<bool, GpioError> {
        lock(&self.pins)
            .get(&pin)
            .map(|p| p.high)
            .ok_or(GpioError::PinUnavailable(pin))
    }

    fn on_edge(&self, pin: u8, edge: Edge, callback: EdgeCallback) -> Result<(), GpioError> {
        match lock(&self.pins).get(&pin) {
            Some(p) if matches!(p.mode, PinMode::Input(_)) => {}
            Some(_) => {
                return Err(GpioError::WrongMode {
                    pin,
                    expected: "input",
                })
            }
            None => return Err(GpioError::PinUnavailable(pin)),
        }
        lock(&self.callbacks)
            .entry(pin)
            .or_default()
            .push((edge, callback));
        Ok(())
    }
}

// A poisoned lock only means a callback panicked; the pin map is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_write_requires_output_mode() {
        let gpio = SimulatedGpio::new();
        assert!(matches!(
            gpio.write(4, true),
            Err(GpioError::PinUnavailable(4))
        ));

        gpio.set_mode(4, PinMode::Input(Pull::Up)).unwrap();
        assert!(matches!(
            gpio.write(4, true),
            Err(GpioError::WrongMode { pin: 4, .. })
        ));

        gpio.set_mode(5, PinMode::Output).unwrap();
        gpio.write(5, true).unwrap();
        assert_eq!(gpio.level(5), Some(true));
        assert_eq!(gpio.writes_to(5), vec![true]);
    }

    #[test]
    fn test_pull_up_reads_high() {
        let gpio = SimulatedGpio::new();
        gpio.set_mode(19, PinMode::Input(Pull::Up)).unwrap();
        assert!(gpio.read(19).unwrap());
        gpio.press(19);
        assert!(!gpio.read(19).unwrap());
    }

    #[test]
    fn test_falling_edge_fires_once_per_transition() {
        let gpio = SimulatedGpio::new();
        gpio.set_mode(13, PinMode::Input(Pull::Up)).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        gpio.on_edge(
            13,
            Edge::Falling,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        gpio.press(13);
        gpio.press(13); // no transition
        gpio.release(13);
        gpio.press(13);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_may_drive_its_own_pin() {
        let gpio = Arc::new(SimulatedGpio::new());
        gpio.set_mode(26, PinMode::Input(Pull::Up)).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let line = Arc::downgrade(&gpio);
        gpio.on_edge(
            26,
            Edge::Falling,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(gpio) = line.upgrade() {
                    gpio.release(26);
                }
            }),
        )
        .unwrap();

        gpio.press(26);
        assert_eq!(gpio.level(26), Some(true));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        gpio.press(26);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(gpio.callback_count(26), 1);
    }
}
