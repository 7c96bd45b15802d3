//! Camera input, camera settings and capture output.
//!
//! The camera and the encoders are collaborators of the capture rig:
//! the rig decides when to open, grab, encode and release, and these
//! types only do what they are told.

mod camera;
mod config;
#[cfg(feature = "camera")]
mod device;
mod frame;
mod settings;
mod writer;

pub use camera::{Camera, CameraControl, CameraError, SimulatedCamera};
pub use config::{CaptureConfig, ConfigError, FileConfig, OutputConfig, PinConfig, TimingConfig};
#[cfg(feature = "camera")]
pub use device::DeviceCamera;
pub use frame::Frame;
pub use settings::{AppliedSettings, BoundedSetting, CameraSettings, SettingKind};
pub use writer::{
    encode_jpeg, save_still, AviWriter, VideoCodec, VideoWriter, WriterError, STILL_EXTENSION,
};
