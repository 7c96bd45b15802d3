//! Physical camera backend built on `nokhwa`.

use super::{Camera, CameraControl, CameraError, CaptureConfig, Frame};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, ControlValueSetter, FrameFormat, KnownCameraControl,
    RequestedFormat, RequestedFormatType, Resolution,
};

/// A V4L2/UVC camera opened through `nokhwa`, delivering RGB frames.
#[derive(Default)]
pub struct DeviceCamera {
    device: Option<nokhwa::Camera>,
    sequence: u64,
}

impl DeviceCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

/// V4L2 `EXPOSURE_AUTO` control id.
const EXPOSURE_AUTO: u128 = 0x009a_0901;
/// `V4L2_EXPOSURE_MANUAL`: exposure follows `EXPOSURE_ABSOLUTE`.
const EXPOSURE_MANUAL: i64 = 1;

/// Control write that takes auto exposure off, so strobe-lit and unlit
/// frames keep the same exposure time.
fn manual_exposure() -> (KnownCameraControl, ControlValueSetter) {
    (
        KnownCameraControl::Other(EXPOSURE_AUTO),
        ControlValueSetter::Integer(EXPOSURE_MANUAL),
    )
}

fn known_control(control: CameraControl) -> KnownCameraControl {
    match control {
        CameraControl::Exposure => KnownCameraControl::Exposure,
        CameraControl::Brightness => KnownCameraControl::Brightness,
        CameraControl::Contrast => KnownCameraControl::Contrast,
        CameraControl::Saturation => KnownCameraControl::Saturation,
    }
}

impl Camera for DeviceCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        self.release();

        let format = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps.round() as u32,
        );
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));
        let mut device = nokhwa::Camera::new(CameraIndex::Index(config.device_index), requested)
            .map_err(|e| CameraError::DeviceNotFound(e.to_string()))?;
        device
            .open_stream()
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        let (control, value) = manual_exposure();
        if let Err(e) = device.set_camera_control(control, value) {
            tracing::warn!(error = %e, "Manual exposure not available, exposure may drift");
        }

        tracing::info!(
            device = config.device_index,
            format = ?device.camera_format(),
            "Camera opened"
        );
        self.device = Some(device);
        Ok(())
    }

    fn set_resolution(&mut self, width: u32, height: u32) -> Result<(), CameraError> {
        let device = self.device.as_mut().ok_or(CameraError::NotInitialized)?;
        device
            .set_resolution(Resolution::new(width, height))
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let device = self.device.as_mut().ok_or(CameraError::NotInitialized)?;
        let buffer = device
            .frame()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        let (width, height) = image.dimensions();
        let pixels = image.into_raw();
        if pixels.is_empty() {
            return Err(CameraError::EmptyFrame);
        }
        self.sequence += 1;
        Ok(Frame::rgb(pixels, width, height, self.sequence))
    }

    fn set_control(&mut self, control: CameraControl, value: i32) -> Result<(), CameraError> {
        let device = self.device.as_mut().ok_or(CameraError::NotInitialized)?;
        device
            .set_camera_control(known_control(control), ControlValueSetter::Integer(value.into()))
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.stop_stream() {
                tracing::warn!(error = %e, "Failed to stop camera stream");
            }
            tracing::debug!("Camera released");
        }
    }
}
