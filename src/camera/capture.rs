//! Camera capture handle and public grab/retrieve API.

use std::sync::Arc;
use std::time::Duration;

use super::buffers::FrameSlot;
use super::cache::ConversionCache;
use super::device::{CameraDevice, DeviceProperty, FrameSink};
use super::gate::Gate;
use super::types::{
    CameraError, CaptureSettings, CaptureState, CaptureStats, GrabOutcome, OutputCategory,
    OutputKind, PixelFormat, PixelLayout, PropertyId, PropertyOp, PropertyValue, Resolution,
};

/// A decoded image borrowed from the capture.
///
/// Valid until the next grab: the borrow checker will not let a grab happen
/// while a view is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageView<'a> {
    pub resolution: Resolution,
    pub layout: PixelLayout,
    pub data: &'a [u8],
}

impl<'a> ImageView<'a> {
    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    pub fn channels(&self) -> usize {
        self.layout.channels
    }

    /// Bytes of one row.
    pub fn stride(&self) -> usize {
        self.resolution.width as usize * self.layout.channels
    }

    /// Channel values of the pixel at (`x`, `y`), or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&'a [u8]> {
        if x >= self.resolution.width || y >= self.resolution.height {
            return None;
        }
        let start = y as usize * self.stride() + x as usize * self.layout.channels;
        self.data.get(start..start + self.layout.channels)
    }
}

/// Releases a capture blocked in `grab` from another thread.
///
/// After [`shutdown`](Self::shutdown) every grab fails and delivered frames
/// are ignored; the camera itself is disconnected when the capture is dropped.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    gate: Arc<Gate>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        log::info!("Capture shutdown requested");
        self.gate.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.gate.is_closed()
    }

    /// A grab is currently blocked waiting for a frame.
    pub fn is_waiting(&self) -> bool {
        self.gate.is_waiting()
    }
}

/// Camera capture handle.
///
/// Bridges the device's push-style frame callback to a pull-style
/// `grab` / `retrieve` API. The device delivers frames from its own thread
/// into a shared gate; `grab` claims the freshest one and `retrieve`
/// decodes it on the calling thread, caching the result until the next grab.
///
/// Single consumer: `grab` and `retrieve` take `&mut self`.
pub struct CameraCapture {
    device: Arc<dyn CameraDevice>,
    /// Shared with the device's frame sink
    gate: Arc<Gate>,
    /// Last grabbed frame
    current: FrameSlot,
    cache: ConversionCache,
    /// Resolved on first retrieve, then fixed
    format: Option<PixelFormat>,
    settings: CaptureSettings,
}

impl std::fmt::Debug for CameraCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraCapture")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl CameraCapture {
    /// Connect `device` and start accepting frames.
    ///
    /// # Errors
    /// * `CameraError::ConnectFailed` - The device refused the connection.
    ///   No capture object is produced.
    pub fn open(
        device: Arc<dyn CameraDevice>,
        settings: CaptureSettings,
    ) -> Result<Self, CameraError> {
        let gate = Arc::new(Gate::new(settings.auto_grab));
        let sink = FrameSink::new(Arc::clone(&gate), Arc::downgrade(&device));

        if let Err(source) = device.connect(settings.camera_id, sink) {
            log::error!(
                "Failed to connect to camera {}: error code {}",
                settings.camera_id,
                source.code()
            );
            gate.close();
            return Err(CameraError::ConnectFailed {
                camera_id: settings.camera_id,
                source,
            });
        }

        log::info!("Camera {} opened", settings.camera_id);
        Ok(Self {
            device,
            gate,
            current: None,
            cache: ConversionCache::new(settings.copy_gray),
            format: None,
            settings,
        })
    }

    /// Connected and not shut down.
    pub fn is_opened(&self) -> bool {
        !self.gate.is_closed() && self.device.is_connected()
    }

    /// Wait for a new frame and claim it.
    ///
    /// Blocks until a frame arrives unless `grab_timeout` is configured.
    /// Returns false when no new frame became available; callers may retry.
    pub fn grab(&mut self) -> bool {
        self.grab_next().is_grabbed()
    }

    /// Like [`grab`](Self::grab) but reports why no frame was claimed.
    pub fn grab_next(&mut self) -> GrabOutcome {
        if !self.is_opened() {
            log::error!("Cannot grab frame: camera is not connected");
            return GrabOutcome::Closed;
        }
        self.grab_with(self.settings.grab_timeout)
    }

    /// Like [`grab`](Self::grab) but gives up after `timeout`.
    pub fn grab_timeout(&mut self, timeout: Duration) -> GrabOutcome {
        if !self.is_opened() {
            log::error!("Cannot grab frame: camera is not connected");
            return GrabOutcome::Closed;
        }
        self.grab_with(Some(timeout))
    }

    fn grab_with(&mut self, timeout: Option<Duration>) -> GrabOutcome {
        let device = &self.device;
        let outcome = self
            .gate
            .wait_for_frame(&mut self.current, timeout, || device.apply_properties());

        if outcome.is_grabbed() {
            self.cache.invalidate();
        }
        outcome
    }

    /// Decode the last grabbed frame as `kind`.
    ///
    /// Returns `Ok(None)` if nothing was grabbed yet or the camera's pixel
    /// format is not supported. The result is cached until the next grab.
    ///
    /// # Errors
    /// * `CameraError::OddDimensions` - Color output needs even width and height.
    /// * `CameraError::BufferTooSmall` - The grabbed frame is truncated.
    pub fn retrieve(&mut self, kind: OutputKind) -> Result<Option<ImageView<'_>>, CameraError> {
        let Some(frame) = self.current.as_ref() else {
            return Ok(None);
        };

        let format = match self.format {
            Some(format) => format,
            None => {
                let format = resolve_format(self.device.as_ref());
                self.format = Some(format);
                format
            }
        };
        if !format.is_known() {
            return Ok(None);
        }

        let layout = kind.layout();
        let data = match layout.category {
            OutputCategory::Gray => Some(self.cache.gray(frame)?),
            OutputCategory::Color => self.cache.color(frame, format, layout)?,
        };

        Ok(data.map(|data| ImageView {
            resolution: frame.resolution(),
            layout,
            data,
        }))
    }

    /// Numeric-code variant of [`retrieve`](Self::retrieve).
    ///
    /// # Errors
    /// * `CameraError::UnsupportedOutputKind` - `code` is not one of 0..=4.
    pub fn retrieve_code(&mut self, code: i32) -> Result<Option<ImageView<'_>>, CameraError> {
        let kind = OutputKind::try_from(code)?;
        self.retrieve(kind)
    }

    /// Read a camera property.
    ///
    /// # Errors
    /// * `CameraError::NotOpened` - The capture was shut down.
    /// * `CameraError::UnsupportedProperty` - `id` cannot be read.
    pub fn property(&self, id: PropertyId) -> Result<PropertyValue, CameraError> {
        if !self.is_opened() {
            return Err(CameraError::NotOpened);
        }
        let value = match id {
            PropertyId::FrameWidth => PropertyValue::Number(self.device.frame_width() as f64),
            PropertyId::FrameHeight => PropertyValue::Number(self.device.frame_height() as f64),
            PropertyId::SupportedPreviewSizes => {
                self.device.property(DeviceProperty::SupportedPreviewSizes)
            }
            PropertyId::PreviewFormat => self.device.property(DeviceProperty::PreviewFormat),
            PropertyId::AutoGrab => {
                log::error!("Failed attempt to GET unsupported camera property: {}", id);
                return Err(CameraError::UnsupportedProperty {
                    id,
                    op: PropertyOp::Get,
                });
            }
        };
        Ok(value)
    }

    /// Change a camera property.
    ///
    /// Returns `Ok(false)` when the camera is not opened. Width and height
    /// changes are applied by the next grab, which also drops any frame
    /// still at the old size.
    ///
    /// # Errors
    /// * `CameraError::UnsupportedProperty` - `id` cannot be written.
    /// * `CameraError::InvalidPropertyValue` - a width or height that is not
    ///   a positive `u32`.
    pub fn set_property(&mut self, id: PropertyId, value: f64) -> Result<bool, CameraError> {
        if !self.is_opened() {
            return Ok(false);
        }

        match id {
            PropertyId::FrameWidth => {
                check_dimension(id, value)?;
                self.device.set_property(DeviceProperty::FrameWidth, value);
                self.gate.mark_properties_changed();
            }
            PropertyId::FrameHeight => {
                check_dimension(id, value)?;
                self.device.set_property(DeviceProperty::FrameHeight, value);
                self.gate.mark_properties_changed();
            }
            PropertyId::AutoGrab => {
                self.settings.auto_grab = value != 0.0;
                self.gate.set_auto_grab(self.settings.auto_grab);
            }
            PropertyId::SupportedPreviewSizes | PropertyId::PreviewFormat => {
                log::error!("Failed attempt to SET unsupported camera property: {}", id);
                return Err(CameraError::UnsupportedProperty {
                    id,
                    op: PropertyOp::Set,
                });
            }
        }
        Ok(true)
    }

    /// Whether `retrieve(kind)` would be answered from the cache.
    pub fn is_cached(&self, kind: OutputKind) -> bool {
        self.cache.is_valid(kind)
    }

    pub fn state(&self) -> CaptureState {
        self.gate.state()
    }

    pub fn stats(&self) -> CaptureStats {
        self.gate.stats()
    }

    /// Conversions performed so far; cache hits do not count.
    pub fn conversion_count(&self) -> u64 {
        self.cache.conversions()
    }

    /// Pixel format, once the first retrieve has resolved it.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.format
    }

    /// Size of the last grabbed frame.
    pub fn current_resolution(&self) -> Option<Resolution> {
        self.current.as_ref().map(|frame| frame.resolution())
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        let stats = self.gate.stats();
        log::info!(
            "FRAMES received: {} grabbed: {}",
            stats.frames_received,
            stats.frames_grabbed
        );

        // release waiters and buffers before the device goes away
        self.gate.close();
        self.current = None;
        self.device.disconnect();
    }
}

/// Width and height must survive the device's cast to `u32` unchanged in sign.
fn check_dimension(id: PropertyId, value: f64) -> Result<(), CameraError> {
    if value.is_finite() && value >= 1.0 && value <= u32::MAX as f64 {
        return Ok(());
    }
    log::error!("Invalid value {} for camera property: {}", value, id);
    Err(CameraError::InvalidPropertyValue { id, value })
}

fn resolve_format(device: &dyn CameraDevice) -> PixelFormat {
    let format = match device.property(DeviceProperty::PreviewFormat) {
        PropertyValue::Text(name) => PixelFormat::from_preview_format(&name),
        PropertyValue::Number(_) => PixelFormat::Unknown,
    };
    if format.is_known() {
        log::debug!("Camera pixel format: {:?}", format);
    } else {
        log::warn!("Unsupported camera pixel format, frames cannot be converted");
    }
    format
}
