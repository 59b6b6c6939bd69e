//! Software camera that produces YUV 4:2:0 test frames on its own thread.
//!
//! Behaves like a native camera layer: frames are pushed through the
//! [`FrameSink`] at the configured rate, width/height changes are staged and
//! only take effect on `apply_properties`, and the preview format string is
//! whatever the settings say (so an unsupported format can be simulated).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::device::{CameraDevice, DeviceProperty, FrameSink};
use super::types::{DeviceError, PropertyValue, Resolution};

/// Settings for a [`SyntheticCamera`].
#[derive(Debug, Clone)]
pub struct SyntheticSettings {
    /// Initial frame size
    pub resolution: Resolution,
    /// Frames per second pushed to the sink
    pub fps: u32,
    /// Reported preview format, e.g. `yuv420sp`
    pub preview_format: String,
    /// Reported supported preview sizes
    pub supported_sizes: Vec<Resolution>,
    /// Valid camera ids are `0..camera_count`
    pub camera_count: i32,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::MEDIUM,
            fps: 30,
            preview_format: "yuv420sp".to_string(),
            supported_sizes: vec![Resolution::HIGH, Resolution::MEDIUM, Resolution::LOW],
            camera_count: 1,
        }
    }
}

#[derive(Debug)]
struct DeviceConfig {
    active: Resolution,
    requested: Resolution,
    fps: u32,
    preview_format: String,
    supported_sizes: Vec<Resolution>,
}

#[derive(Debug)]
struct Shared {
    config: Mutex<DeviceConfig>,
    connected: AtomicBool,
    stop: AtomicBool,
    frames_sent: AtomicU64,
}

impl Shared {
    fn config(&self) -> MutexGuard<'_, DeviceConfig> {
        // config updates cannot leave it half-written
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A [`CameraDevice`] backed by a generated test pattern.
pub struct SyntheticCamera {
    shared: Arc<Shared>,
    camera_count: i32,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SyntheticCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticCamera")
            .field("connected", &self.is_connected())
            .field("frames_sent", &self.frames_sent())
            .finish_non_exhaustive()
    }
}

impl SyntheticCamera {
    pub fn new(settings: SyntheticSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                config: Mutex::new(DeviceConfig {
                    active: settings.resolution,
                    requested: settings.resolution,
                    fps: settings.fps.max(1),
                    preview_format: settings.preview_format,
                    supported_sizes: settings.supported_sizes,
                }),
                connected: AtomicBool::new(false),
                stop: AtomicBool::new(false),
                frames_sent: AtomicU64::new(0),
            }),
            camera_count: settings.camera_count,
            worker: Mutex::new(None),
        }
    }

    /// Frames handed to the sink so far, accepted or not.
    pub fn frames_sent(&self) -> u64 {
        self.shared.frames_sent.load(Ordering::SeqCst)
    }

    pub fn resolution(&self) -> Resolution {
        self.shared.config().active
    }
}

impl CameraDevice for SyntheticCamera {
    fn connect(&self, camera_id: i32, sink: FrameSink) -> Result<(), DeviceError> {
        if !(0..self.camera_count).contains(&camera_id) {
            return Err(DeviceError::NotFound(camera_id));
        }
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if self.shared.connected.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::AlreadyConnected);
        }
        self.shared.stop.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        *worker = Some(thread::spawn(move || run_producer(shared, sink)));
        log::info!("Synthetic camera {} connected", camera_id);
        Ok(())
    }

    fn disconnect(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.connected.store(false, Ordering::SeqCst);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            // the producer itself may hold the last reference to us
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
            log::info!("Synthetic camera disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn frame_width(&self) -> u32 {
        self.shared.config().active.width
    }

    fn frame_height(&self) -> u32 {
        self.shared.config().active.height
    }

    fn property(&self, key: DeviceProperty) -> PropertyValue {
        let config = self.shared.config();
        match key {
            DeviceProperty::FrameWidth => PropertyValue::Number(config.active.width as f64),
            DeviceProperty::FrameHeight => PropertyValue::Number(config.active.height as f64),
            DeviceProperty::SupportedPreviewSizes => PropertyValue::Text(
                config
                    .supported_sizes
                    .iter()
                    .map(|size| size.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            DeviceProperty::PreviewFormat => PropertyValue::Text(config.preview_format.clone()),
        }
    }

    fn set_property(&self, key: DeviceProperty, value: f64) {
        let mut config = self.shared.config();
        match key {
            DeviceProperty::FrameWidth => config.requested.width = value as u32,
            DeviceProperty::FrameHeight => config.requested.height = value as u32,
            other => log::warn!("Synthetic camera ignores SET of {:?}", other),
        }
    }

    fn apply_properties(&self) {
        let mut config = self.shared.config();
        if config.requested != config.active {
            log::info!(
                "Synthetic camera switching from {} to {}",
                config.active,
                config.requested
            );
            config.active = config.requested;
        }
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Producer loop: build a frame, push it, sleep one frame interval.
fn run_producer(shared: Arc<Shared>, sink: FrameSink) {
    let mut index: u64 = 0;
    while !shared.stop.load(Ordering::Relaxed) {
        let (resolution, fps) = {
            let config = shared.config();
            (config.active, config.fps)
        };

        // the config lock must be released here: the sink reads the frame size back
        let frame = test_pattern(resolution, index);
        shared.frames_sent.fetch_add(1, Ordering::SeqCst);
        if !sink.on_frame_buffer(&frame) {
            log::trace!("Synthetic frame {} not accepted", index);
        }

        index = index.wrapping_add(1);
        thread::sleep(Duration::from_micros(1_000_000 / fps as u64));
    }
}

/// A moving diagonal luma ramp over four chroma quadrants.
///
/// The first luma byte is the low byte of `index`, so consumers can tell
/// frames apart.
pub fn test_pattern(resolution: Resolution, index: u64) -> Vec<u8> {
    let Some(len) = resolution.yuv420_len() else {
        return Vec::new();
    };
    let width = resolution.width as usize;
    let height = resolution.height as usize;
    let mut frame = vec![0u8; len];
    let (luma, chroma) = frame.split_at_mut(width * height);

    for (row, line) in luma.chunks_exact_mut(width.max(1)).enumerate() {
        for (col, y) in line.iter_mut().enumerate() {
            *y = (row + col + index as usize) as u8;
        }
    }
    if let Some(first) = luma.first_mut() {
        *first = index as u8;
    }

    // one (V, U) pair per 2x2 block
    for (i, pair) in chroma.chunks_exact_mut(2).enumerate() {
        let block_row = i * 2 / width.max(1);
        let block_col = (i * 2) % width.max(1);
        let right = block_col >= width / 2;
        let bottom = block_row * 2 >= height / 2;
        let (v, u) = match (right, bottom) {
            (false, false) => (128, 128),
            (true, false) => (240, 90),
            (false, true) => (90, 240),
            (true, true) => (60, 60),
        };
        pair[0] = v;
        pair[1] = u;
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_size_and_index() {
        let res = Resolution::new(8, 4);
        let frame = test_pattern(res, 7);
        assert_eq!(Some(frame.len()), res.yuv420_len());
        assert_eq!(frame[0], 7);
        assert_ne!(test_pattern(res, 8)[0], frame[0]);
    }

    #[test]
    fn test_pattern_handles_empty_resolution() {
        assert!(test_pattern(Resolution::new(0, 0), 0).is_empty());
    }

    #[test]
    fn test_property_strings() {
        let camera = SyntheticCamera::new(SyntheticSettings {
            supported_sizes: vec![Resolution::MEDIUM, Resolution::LOW],
            ..SyntheticSettings::default()
        });
        assert_eq!(
            camera.property(DeviceProperty::SupportedPreviewSizes),
            PropertyValue::Text("640x480,320x240".to_string())
        );
        assert_eq!(
            camera.property(DeviceProperty::PreviewFormat),
            PropertyValue::Text("yuv420sp".to_string())
        );
        assert_eq!(
            camera.property(DeviceProperty::FrameWidth),
            PropertyValue::Number(640.0)
        );
    }

    #[test]
    fn test_size_change_is_staged_until_applied() {
        let camera = SyntheticCamera::new(SyntheticSettings::default());
        camera.set_property(DeviceProperty::FrameWidth, 320.0);
        camera.set_property(DeviceProperty::FrameHeight, 240.0);
        assert_eq!(camera.resolution(), Resolution::MEDIUM);

        camera.apply_properties();
        assert_eq!(camera.resolution(), Resolution::LOW);
        assert_eq!(camera.frame_width(), 320);
        assert_eq!(camera.frame_height(), 240);
    }

    #[test]
    fn test_disconnect_without_connect_is_noop() {
        let camera = SyntheticCamera::new(SyntheticSettings::default());
        camera.disconnect();
        assert!(!camera.is_connected());
        assert_eq!(camera.frames_sent(), 0);
    }
}
