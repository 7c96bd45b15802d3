//! Camera abstraction for frame capture.
//!
//! The rig treats the camera as an exclusive resource owned by the
//! control loop: it is opened, read and released only from there.

use super::{CaptureConfig, Frame};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("camera returned an empty frame")]
    EmptyFrame,
    #[error("camera not initialized")]
    NotInitialized,
}

/// Image controls the rig adjusts on the physical camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraControl {
    Exposure,
    Brightness,
    Contrast,
    Saturation,
}

/// Trait for camera implementations.
///
/// This abstraction allows swapping between real camera hardware
/// and simulated implementations for testing.
pub trait Camera {
    /// Opens the camera device selected by `config`.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Requests a capture resolution.
    fn set_resolution(&mut self, width: u32, height: u32) -> Result<(), CameraError>;

    /// Grabs a single frame. A blank grab is reported as [`CameraError::EmptyFrame`].
    fn read_frame(&mut self) -> Result<Frame, CameraError>;

    /// Pushes one image control value to the device.
    fn set_control(&mut self, control: CameraControl, value: i32) -> Result<(), CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources.
    fn release(&mut self);
}

/// Simulated camera that generates synthetic RGB frames.
///
/// Failures can be scripted to exercise the rig's recovery paths.
#[derive(Debug, Default)]
pub struct SimulatedCamera {
    open: bool,
    width: u32,
    height: u32,
    sequence: u64,
    opens: u32,
    failing_opens: u32,
    good_reads: u32,
    empty_reads: u32,
    controls: HashMap<CameraControl, i32>,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls to [`Camera::open`] fail.
    pub fn fail_next_opens(&mut self, count: u32) {
        self.failing_opens = count;
    }

    /// Makes the next `count` grabs return no image.
    pub fn fail_next_reads(&mut self, count: u32) {
        self.fail_reads_after(0, count);
    }

    /// Lets `good` grabs through, then fails the following `count`.
    pub fn fail_reads_after(&mut self, good: u32, count: u32) {
        self.good_reads = good;
        self.empty_reads = count;
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> u32 {
        self.opens
    }

    /// Last value pushed for a control.
    pub fn control(&self, control: CameraControl) -> Option<i32> {
        self.controls.get(&control).copied()
    }
}

impl Camera for SimulatedCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        if self.failing_opens > 0 {
            self.failing_opens -= 1;
            return Err(CameraError::OpenFailed(format!(
                "simulated device {} unavailable",
                config.device_index
            )));
        }
        self.open = true;
        self.width = config.width;
        self.height = config.height;
        self.opens += 1;
        // A reopened device starts from driver defaults.
        self.controls.clear();
        tracing::debug!(device = config.device_index, "SimulatedCamera opened");
        Ok(())
    }

    fn set_resolution(&mut self, width: u32, height: u32) -> Result<(), CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }
        if width == 0 || height == 0 {
            return Err(CameraError::ConfigFailed(format!(
                "invalid resolution {width}x{height}"
            )));
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }
        if self.good_reads > 0 {
            self.good_reads -= 1;
        } else if self.empty_reads > 0 {
            self.empty_reads -= 1;
            return Err(CameraError::EmptyFrame);
        }

        self.sequence += 1;
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (self.sequence % 256) as usize;
        let mut pixels = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                pixels.push(((x + shift) % 256) as u8);
                pixels.push(((y + shift) % 256) as u8);
                pixels.push(((x + y) % 256) as u8);
            }
        }
        Ok(Frame::rgb(pixels, self.width, self.height, self.sequence))
    }

    fn set_control(&mut self, control: CameraControl, value: i32) -> Result<(), CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }
        self.controls.insert(control, value);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            tracing::debug!("SimulatedCamera released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> CaptureConfig {
        CaptureConfig::with_dimensions(8, 6)
    }

    #[test]
    fn test_simulated_camera_lifecycle() {
        let mut camera = SimulatedCamera::new();
        assert!(!camera.is_open());

        camera.open(&small_config()).unwrap();
        assert!(camera.is_open());

        let frame = camera.read_frame().unwrap();
        assert!(frame.is_valid());
        assert_eq!(frame.sequence(), 1);

        let frame2 = camera.read_frame().unwrap();
        assert_eq!(frame2.sequence(), 2);

        camera.set_control(CameraControl::Exposure, 300).unwrap();
        camera.release();
        assert!(!camera.is_open());

        camera.open(&small_config()).unwrap();
        assert_eq!(camera.control(CameraControl::Exposure), None);
    }

    #[test]
    fn test_read_without_open() {
        let mut camera = SimulatedCamera::new();
        assert!(matches!(
            camera.read_frame(),
            Err(CameraError::NotInitialized)
        ));
    }

    #[test]
    fn test_scripted_failures() {
        let mut camera = SimulatedCamera::new();
        camera.fail_next_opens(1);
        assert!(matches!(
            camera.open(&small_config()),
            Err(CameraError::OpenFailed(_))
        ));
        camera.open(&small_config()).unwrap();

        camera.fail_next_reads(1);
        assert!(matches!(camera.read_frame(), Err(CameraError::EmptyFrame)));
        assert!(camera.read_frame().is_ok());
        assert_eq!(camera.open_count(), 1);

        camera.fail_reads_after(2, 1);
        assert!(camera.read_frame().is_ok());
        assert!(camera.read_frame().is_ok());
        assert!(matches!(camera.read_frame(), Err(CameraError::EmptyFrame)));
        assert!(camera.read_frame().is_ok());
    }

    #[test]
    fn test_set_resolution_changes_geometry() {
        let mut camera = SimulatedCamera::new();
        camera.open(&small_config()).unwrap();
        camera.set_resolution(4, 2).unwrap();
        assert_eq!(camera.read_frame().unwrap().size(), (4, 2));
    }
}
