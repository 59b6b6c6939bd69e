//! Camera types and data structures.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Camera resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Low resolution (320x240)
    pub const LOW: Resolution = Resolution {
        width: 320,
        height: 240,
    };

    /// Medium resolution (640x480) - the usual preview size
    pub const MEDIUM: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// High resolution (1280x720)
    pub const HIGH: Resolution = Resolution {
        width: 1280,
        height: 720,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in one frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size in bytes of a 12 bits-per-pixel YUV 4:2:0 frame at this resolution.
    ///
    /// `None` when the size does not fit in `usize`.
    pub fn yuv420_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(3)
            .map(|len| len >> 1)
    }

    /// 4:2:0 chroma subsampling needs both dimensions to be even.
    pub fn is_even(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Lifecycle of the frame exchanged between the producer and the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CaptureState {
    /// Nothing usable in the "next" slot
    #[default]
    NoFrame,
    /// A delivered frame is waiting to be grabbed
    NewFrameUnclaimed,
    /// The consumer owns the latest frame
    FrameGrabbed,
}

/// Raw layout of the frames the camera delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Preview format string missing or not a YUV 4:2:0 layout we can decode
    Unknown,
    /// Luma plane followed by interleaved V/U pairs (NV21, "yuv420sp")
    Yuv420SemiPlanar,
    /// Luma plane followed by interleaved U/V pairs (NV12, "yuv420i")
    Yuv420Interleaved,
}

impl PixelFormat {
    /// Resolve the camera's reported preview format string.
    pub fn from_preview_format(name: &str) -> Self {
        match name {
            "yuv420sp" => PixelFormat::Yuv420SemiPlanar,
            "yuv420i" => PixelFormat::Yuv420Interleaved,
            _ => PixelFormat::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, PixelFormat::Unknown)
    }
}

/// Channel order of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Luma,
    Bgr,
    Rgb,
}

/// Which cache slot a decoded image lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCategory {
    Gray,
    Color,
}

/// Shape of a decoded image: channel count, order and cache category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub channels: usize,
    pub order: ChannelOrder,
    pub category: OutputCategory,
}

impl PixelLayout {
    pub fn has_alpha(&self) -> bool {
        self.channels == 4
    }
}

/// Representation requested from [`retrieve`](super::CameraCapture::retrieve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Grayscale,
    ColorBgr,
    ColorRgb,
    ColorBgra,
    ColorRgba,
}

impl OutputKind {
    pub const ALL: [OutputKind; 5] = [
        OutputKind::Grayscale,
        OutputKind::ColorBgr,
        OutputKind::ColorRgb,
        OutputKind::ColorBgra,
        OutputKind::ColorRgba,
    ];

    pub fn layout(self) -> PixelLayout {
        use ChannelOrder::*;
        use OutputCategory::*;
        let (channels, order, category) = match self {
            OutputKind::Grayscale => (1, Luma, Gray),
            OutputKind::ColorBgr => (3, Bgr, Color),
            OutputKind::ColorRgb => (3, Rgb, Color),
            OutputKind::ColorBgra => (4, Bgr, Color),
            OutputKind::ColorRgba => (4, Rgb, Color),
        };
        PixelLayout {
            channels,
            order,
            category,
        }
    }

    /// Legacy numeric code used by capture APIs.
    pub fn code(self) -> i32 {
        match self {
            OutputKind::ColorBgr => 0,
            OutputKind::Grayscale => 1,
            OutputKind::ColorRgb => 2,
            OutputKind::ColorBgra => 3,
            OutputKind::ColorRgba => 4,
        }
    }
}

impl TryFrom<i32> for OutputKind {
    type Error = CameraError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        OutputKind::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(CameraError::UnsupportedOutputKind(code))
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputKind::Grayscale => "gray",
            OutputKind::ColorBgr => "bgr",
            OutputKind::ColorRgb => "rgb",
            OutputKind::ColorBgra => "bgra",
            OutputKind::ColorRgba => "rgba",
        };
        f.write_str(name)
    }
}

/// Capture properties visible to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyId {
    FrameWidth,
    FrameHeight,
    SupportedPreviewSizes,
    PreviewFormat,
    /// Write-only mode flag
    AutoGrab,
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyId::FrameWidth => "frame width",
            PropertyId::FrameHeight => "frame height",
            PropertyId::SupportedPreviewSizes => "supported preview sizes",
            PropertyId::PreviewFormat => "preview format",
            PropertyId::AutoGrab => "auto-grab",
        };
        f.write_str(name)
    }
}

/// Property value as reported by the camera.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            PropertyValue::Number(_) => None,
        }
    }
}

/// Result of a grab that may time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabOutcome {
    /// A fresh frame now belongs to the consumer
    Grabbed,
    /// No frame arrived before the deadline
    TimedOut,
    /// The capture is being torn down
    Closed,
}

impl GrabOutcome {
    pub fn is_grabbed(&self) -> bool {
        matches!(self, GrabOutcome::Grabbed)
    }
}

/// Settings for a camera capture.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Camera id passed to the device on connect
    pub camera_id: i32,
    /// Upper bound for a blocking grab; `None` waits forever
    pub grab_timeout: Option<Duration>,
    /// Copy the luma plane for grayscale output instead of borrowing it
    pub copy_gray: bool,
    /// Initial auto-grab mode
    pub auto_grab: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            camera_id: 0,
            grab_timeout: None,
            copy_gray: false,
            auto_grab: false,
        }
    }
}

/// Frame counters kept by the gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    /// Buffers handed to the callback while connected
    pub frames_received: u64,
    /// Successful grabs
    pub frames_grabbed: u64,
    /// Buffers dropped because their size did not match the frame size
    pub frames_rejected: u64,
    /// Delivered frames replaced by a newer one before anyone grabbed them
    pub frames_overwritten: u64,
}

/// Property access direction, for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOp {
    Get,
    Set,
}

impl fmt::Display for PropertyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyOp::Get => f.write_str("GET"),
            PropertyOp::Set => f.write_str("SET"),
        }
    }
}

/// Errors reported by the collaborator that owns the camera hardware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("camera {0} not found")]
    NotFound(i32),

    #[error("camera is already connected")]
    AlreadyConnected,

    #[error("native camera returned error code {0}")]
    Native(i32),
}

impl DeviceError {
    /// Numeric code as a native camera layer would report it.
    pub fn code(&self) -> i32 {
        match self {
            DeviceError::NotFound(_) => 1,
            DeviceError::AlreadyConnected => 2,
            DeviceError::Native(code) => *code,
        }
    }
}

/// Errors that can occur during camera operations.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("failed to connect to camera {camera_id}: {source}")]
    ConnectFailed {
        camera_id: i32,
        #[source]
        source: DeviceError,
    },

    #[error("camera is not opened")]
    NotOpened,

    #[error("failed attempt to {op} unsupported camera property: {id}")]
    UnsupportedProperty { id: PropertyId, op: PropertyOp },

    #[error("invalid value {value} for camera property: {id}")]
    InvalidPropertyValue { id: PropertyId, value: f64 },

    #[error("output frame format {0} is not supported")]
    UnsupportedOutputKind(i32),

    #[error("YUV 4:2:0 conversion needs even dimensions, got {width}x{height}")]
    OddDimensions { width: u32, height: u32 },

    #[error("frame buffer holds {actual} bytes, {expected} required")]
    BufferTooSmall { expected: usize, actual: usize },
}
