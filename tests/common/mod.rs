//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camgrab::camera::{
    CameraCapture, CameraDevice, CaptureSettings, DeviceError, DeviceProperty, FrameSink,
    PropertyValue, Resolution,
};

#[derive(Debug, Clone, Copy)]
struct Sizes {
    active: Resolution,
    requested: Resolution,
}

/// Camera that delivers frames only when the test pushes them.
pub struct ScriptedCamera {
    sink: Mutex<Option<FrameSink>>,
    connected: AtomicBool,
    sizes: Mutex<Sizes>,
    format: String,
    applied: AtomicUsize,
    refuse: Option<DeviceError>,
}

impl ScriptedCamera {
    pub fn new(resolution: Resolution, format: &str) -> Arc<Self> {
        Arc::new(Self::build(resolution, format, None))
    }

    pub fn refusing(error: DeviceError) -> Arc<Self> {
        Arc::new(Self::build(Resolution::LOW, "yuv420sp", Some(error)))
    }

    fn build(resolution: Resolution, format: &str, refuse: Option<DeviceError>) -> Self {
        Self {
            sink: Mutex::new(None),
            connected: AtomicBool::new(false),
            sizes: Mutex::new(Sizes {
                active: resolution,
                requested: resolution,
            }),
            format: format.to_string(),
            applied: AtomicUsize::new(0),
            refuse,
        }
    }

    /// Push a raw buffer through the sink, as the camera thread would.
    pub fn push(&self, data: &[u8]) -> bool {
        let sink = self.sink.lock().unwrap().clone();
        sink.is_some_and(|sink| sink.on_frame_buffer(data))
    }

    /// A correctly sized frame for the active resolution, every byte `fill`.
    pub fn frame(&self, fill: u8) -> Vec<u8> {
        vec![fill; self.resolution().yuv420_len().unwrap()]
    }

    pub fn resolution(&self) -> Resolution {
        self.sizes.lock().unwrap().active
    }

    pub fn applied_count(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }
}

impl CameraDevice for ScriptedCamera {
    fn connect(&self, _camera_id: i32, sink: FrameSink) -> Result<(), DeviceError> {
        if let Some(error) = &self.refuse {
            return Err(error.clone());
        }
        *self.sink.lock().unwrap() = Some(sink);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn frame_width(&self) -> u32 {
        self.resolution().width
    }

    fn frame_height(&self) -> u32 {
        self.resolution().height
    }

    fn property(&self, key: DeviceProperty) -> PropertyValue {
        match key {
            DeviceProperty::FrameWidth => PropertyValue::Number(self.frame_width() as f64),
            DeviceProperty::FrameHeight => PropertyValue::Number(self.frame_height() as f64),
            DeviceProperty::SupportedPreviewSizes => {
                PropertyValue::Text(self.resolution().to_string())
            }
            DeviceProperty::PreviewFormat => PropertyValue::Text(self.format.clone()),
        }
    }

    fn set_property(&self, key: DeviceProperty, value: f64) {
        let mut sizes = self.sizes.lock().unwrap();
        match key {
            DeviceProperty::FrameWidth => sizes.requested.width = value as u32,
            DeviceProperty::FrameHeight => sizes.requested.height = value as u32,
            _ => {}
        }
    }

    fn apply_properties(&self) {
        let mut sizes = self.sizes.lock().unwrap();
        sizes.active = sizes.requested;
        self.applied.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn open(camera: &Arc<ScriptedCamera>) -> CameraCapture {
    open_with(camera, CaptureSettings::default())
}

pub fn open_with(camera: &Arc<ScriptedCamera>, settings: CaptureSettings) -> CameraCapture {
    let device: Arc<dyn CameraDevice> = camera.clone();
    CameraCapture::open(device, settings).expect("scripted camera should connect")
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < Duration::from_secs(5), "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}
