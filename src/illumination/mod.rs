//! Flash strobe and indicator LEDs.
//!
//! Three independent outputs: the flash bank used for lit frames, the
//! recording indicator, and the success indicator. Write failures are
//! logged and never interrupt a capture.

use crate::capture::PinConfig;
use crate::hardware::{Gpio, GpioError, PinMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Drives the rig's LED outputs.
pub struct IlluminationController {
    gpio: Arc<dyn Gpio>,
    flash_pin: u8,
    recording_pin: u8,
    success_pin: u8,
    flash_on: bool,
    blink_step: Duration,
    blinking: Arc<AtomicBool>,
}

impl IlluminationController {
    pub fn new(gpio: Arc<dyn Gpio>, pins: &PinConfig, blink_step: Duration) -> Self {
        Self {
            gpio,
            flash_pin: pins.flash,
            recording_pin: pins.recording,
            success_pin: pins.success,
            flash_on: false,
            blink_step,
            blinking: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Configures all three pins as outputs and drives them low.
    pub fn configure(&mut self) -> Result<(), GpioError> {
        for pin in [self.flash_pin, self.recording_pin, self.success_pin] {
            self.gpio.set_mode(pin, PinMode::Output)?;
            self.gpio.write(pin, false)?;
        }
        self.flash_on = false;
        Ok(())
    }

    pub fn set_flash(&mut self, on: bool) {
        self.flash_on = on;
        self.drive(self.flash_pin, on);
    }

    /// Inverts the flash output and returns the new state.
    pub fn toggle_flash(&mut self) -> bool {
        self.set_flash(!self.flash_on);
        self.flash_on
    }

    #[inline]
    pub fn is_flash_on(&self) -> bool {
        self.flash_on
    }

    pub fn set_recording(&self, on: bool) {
        self.drive(self.recording_pin, on);
    }

    pub fn set_success(&self, on: bool) {
        self.drive(self.success_pin, on);
    }

    /// Drives the flash and recording outputs low.
    pub fn all_off(&mut self) {
        self.set_flash(false);
        self.set_recording(false);
    }

    /// Blinks the success LED on/off twice on a detached worker.
    ///
    /// Returns immediately. A request made while a blink is still
    /// running is dropped.
    pub fn signal_success(&self) {
        if self.blinking.swap(true, Ordering::AcqRel) {
            tracing::debug!("Success blink already running");
            return;
        }

        let gpio = Arc::clone(&self.gpio);
        let pin = self.success_pin;
        let step = self.blink_step;
        let blinking = Arc::clone(&self.blinking);
        let spawned = std::thread::Builder::new()
            .name("success-blink".to_owned())
            .spawn(move || {
                for (i, level) in [true, false, true, false].into_iter().enumerate() {
                    if let Err(e) = gpio.write(pin, level) {
                        tracing::warn!(pin, error = %e, "Success LED write failed");
                    }
                    if i < 3 {
                        std::thread::sleep(step);
                    }
                }
                blinking.store(false, Ordering::Release);
            });

        if let Err(e) = spawned {
            self.blinking.store(false, Ordering::Release);
            tracing::warn!(error = %e, "Could not start success blink");
        }
    }

    /// True while a success blink is in flight.
    pub fn is_blinking(&self) -> bool {
        self.blinking.load(Ordering::Acquire)
    }

    fn drive(&self, pin: u8, on: bool) {
        if let Err(e) = self.gpio.write(pin, on) {
            tracing::warn!(pin, on, error = %e, "LED write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedGpio;
    use std::time::Instant;

    fn controller() -> (Arc<SimulatedGpio>, IlluminationController) {
        let gpio = Arc::new(SimulatedGpio::new());
        let mut lights =
            IlluminationController::new(gpio.clone(), &PinConfig::default(), Duration::ZERO);
        lights.configure().unwrap();
        (gpio, lights)
    }

    fn wait_for_blink(lights: &IlluminationController) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while lights.is_blinking() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_configure_drives_outputs_low() {
        let (gpio, _lights) = controller();
        let pins = PinConfig::default();
        for pin in [pins.flash, pins.recording, pins.success] {
            assert_eq!(gpio.mode(pin), Some(PinMode::Output));
            assert_eq!(gpio.level(pin), Some(false));
        }
    }

    #[test]
    fn test_toggle_flash_alternates() {
        let (gpio, mut lights) = controller();
        assert!(lights.toggle_flash());
        assert!(!lights.toggle_flash());
        assert!(lights.toggle_flash());
        assert_eq!(
            gpio.writes_to(PinConfig::default().flash),
            vec![false, true, false, true]
        );
    }

    #[test]
    fn test_all_off() {
        let (gpio, mut lights) = controller();
        let pins = PinConfig::default();
        lights.set_flash(true);
        lights.set_recording(true);
        lights.all_off();
        assert_eq!(gpio.level(pins.flash), Some(false));
        assert_eq!(gpio.level(pins.recording), Some(false));
    }

    #[test]
    fn test_success_blink_pattern() {
        let (gpio, lights) = controller();
        lights.signal_success();
        wait_for_blink(&lights);

        assert_eq!(
            gpio.writes_to(PinConfig::default().success),
            vec![false, true, false, true, false]
        );
    }

    #[test]
    fn test_unconfigured_write_is_not_fatal() {
        let gpio = Arc::new(SimulatedGpio::new());
        let mut lights =
            IlluminationController::new(gpio.clone(), &PinConfig::default(), Duration::ZERO);
        lights.set_flash(true);
        assert!(lights.is_flash_on());
        assert!(gpio.writes().is_empty());
    }
}
