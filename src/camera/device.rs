//! Hardware collaborator interface.
//!
//! A [`CameraDevice`] owns the connection to the physical camera and pushes
//! raw frames from its own thread through the [`FrameSink`] it receives on
//! connect. The capture drives it only through this trait.

use std::fmt;
use std::sync::{Arc, Weak};

use super::gate::Gate;
use super::types::{DeviceError, PropertyValue, Resolution};

/// Properties the camera layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProperty {
    FrameWidth,
    FrameHeight,
    /// Comma separated `WxH` list
    SupportedPreviewSizes,
    /// Name of the raw frame layout, e.g. `yuv420sp`
    PreviewFormat,
}

/// Camera hardware as seen by the capture.
///
/// Implementations are shared between the capture and their own producer
/// thread, hence `Send + Sync` and `&self` everywhere.
pub trait CameraDevice: Send + Sync {
    /// Open camera `camera_id` and start delivering frames to `sink`.
    fn connect(&self, camera_id: i32, sink: FrameSink) -> Result<(), DeviceError>;

    /// Stop delivering frames and release the camera. Must be idempotent.
    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Width of the frames currently being delivered.
    fn frame_width(&self) -> u32;

    /// Height of the frames currently being delivered.
    fn frame_height(&self) -> u32;

    fn property(&self, key: DeviceProperty) -> PropertyValue;

    /// Stage a new value; it takes effect on [`apply_properties`](Self::apply_properties).
    fn set_property(&self, key: DeviceProperty, value: f64);

    /// Apply every staged property change at once.
    fn apply_properties(&self);
}

/// Inbound frame callback handed to a [`CameraDevice`] on connect.
///
/// Holds only a weak reference to the device, so a device storing its sink
/// does not keep itself alive.
#[derive(Clone)]
pub struct FrameSink {
    gate: Arc<Gate>,
    device: Weak<dyn CameraDevice>,
}

impl FrameSink {
    pub(crate) fn new(gate: Arc<Gate>, device: Weak<dyn CameraDevice>) -> Self {
        Self { gate, device }
    }

    /// Deliver one raw YUV 4:2:0 buffer.
    ///
    /// Returns false when the frame was not accepted: the device is gone or
    /// disconnected, the capture is closed, or the buffer size does not match
    /// the device's current frame size.
    pub fn on_frame_buffer(&self, buffer: &[u8]) -> bool {
        if buffer.is_empty() {
            return false;
        }
        match self.device.upgrade() {
            Some(device) if device.is_connected() => self.gate.deliver(buffer, || {
                Resolution::new(device.frame_width(), device.frame_height())
            }),
            _ => false,
        }
    }
}

impl fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSink")
            .field("device_alive", &(self.device.strong_count() > 0))
            .finish_non_exhaustive()
    }
}
