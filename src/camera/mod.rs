//! Camera frame hand-off engine.
//!
//! This module provides a pull-style capture API over a push-style camera:
//! - Hardware interface via [`CameraDevice`] and its inbound [`FrameSink`]
//! - Frame grabbing and decoding via [`CameraCapture`]
//! - A software camera for demos and tests via [`SyntheticCamera`]

mod buffers;
mod cache;
mod capture;
pub mod convert;
mod device;
mod gate;
mod synthetic;
mod types;

pub use buffers::RawFrame;
pub use capture::{CameraCapture, ImageView, ShutdownHandle};
pub use device::{CameraDevice, DeviceProperty, FrameSink};
pub use synthetic::{test_pattern, SyntheticCamera, SyntheticSettings};
pub use types::{
    CameraError, CaptureSettings, CaptureState, CaptureStats, ChannelOrder, DeviceError,
    GrabOutcome, OutputCategory, OutputKind, PixelFormat, PixelLayout, PropertyId, PropertyOp,
    PropertyValue, Resolution,
};
