//! Raspberry Pi GPIO backend built on `rppal`.

use super::gpio::{Edge, EdgeCallback, Gpio, GpioError, PinMode, Pull};
use rppal::gpio::{Gpio as RppalGpio, InputPin, Level, OutputPin, Trigger};
use std::collections::HashMap;
use std::sync::Mutex;

enum Line {
    Input(InputPin),
    Output(OutputPin),
}

/// GPIO on the Raspberry Pi header (BCM numbering).
pub struct RpiGpio {
    gpio: RppalGpio,
    lines: Mutex<HashMap<u8, Line>>,
}

impl RpiGpio {
    /// Opens the GPIO peripheral.
    pub fn new() -> Result<Self, GpioError> {
        let gpio = RppalGpio::new().map_err(|e| GpioError::InitFailed(e.to_string()))?;
        tracing::info!("Raspberry Pi GPIO initialized");
        Ok(Self {
            gpio,
            lines: Mutex::new(HashMap::new()),
        })
    }

    fn lines(&self) -> std::sync::MutexGuard<'_, HashMap<u8, Line>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Gpio for RpiGpio {
    fn set_mode(&self, pin: u8, mode: PinMode) -> Result<(), GpioError> {
        let mut lines = self.lines();
        // Dropping the previous handle releases the pin so it can be claimed again.
        lines.remove(&pin);

        let raw = self
            .gpio
            .get(pin)
            .map_err(|_| GpioError::PinUnavailable(pin))?;
        let line = match mode {
            PinMode::Output => {
                let mut output = raw.into_output();
                output.set_reset_on_drop(true);
                Line::Output(output)
            }
            PinMode::Input(Pull::Up) => Line::Input(raw.into_input_pullup()),
            PinMode::Input(Pull::Down) => Line::Input(raw.into_input_pulldown()),
            PinMode::Input(Pull::Off) => Line::Input(raw.into_input()),
        };
        lines.insert(pin, line);
        Ok(())
    }

    fn write(&self, pin: u8, high: bool) -> Result<(), GpioError> {
        match self.lines().get_mut(&pin) {
            Some(Line::Output(output)) => {
                output.write(if high { Level::High } else { Level::Low });
                Ok(())
            }
            Some(Line::Input(_)) => Err(GpioError::WrongMode {
                pin,
                expected: "output",
            }),
            None => Err(GpioError::PinUnavailable(pin)),
        }
    }

    fn read(&self, pin: u8) -> Result<bool, GpioError> {
        match self.lines().get(&pin) {
            Some(Line::Input(input)) => Ok(input.is_high()),
            Some(Line::Output(output)) => Ok(output.is_set_high()),
            None => Err(GpioError::PinUnavailable(pin)),
        }
    }

    fn on_edge(&self, pin: u8, edge: Edge, mut callback: EdgeCallback) -> Result<(), GpioError> {
        let trigger = match edge {
            Edge::Rising => Trigger::RisingEdge,
            Edge::Falling => Trigger::FallingEdge,
            Edge::Both => Trigger::Both,
        };
        match self.lines().get_mut(&pin) {
            Some(Line::Input(input)) => input
                .set_async_interrupt(trigger, move |_level: Level| callback())
                .map_err(|e| GpioError::CallbackFailed {
                    pin,
                    reason: e.to_string(),
                }),
            Some(Line::Output(_)) => Err(GpioError::WrongMode {
                pin,
                expected: "input",
            }),
            None => Err(GpioError::PinUnavailable(pin)),
        }
    }
}
