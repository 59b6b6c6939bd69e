//! Integration tests for the producer/consumer frame hand-off.
//!
//! A scripted camera pushes frames on demand so each scenario controls
//! exactly what was delivered before and during a grab.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use camgrab::camera::{
    CameraCapture, CameraDevice, CameraError, CaptureSettings, CaptureState, DeviceError,
    GrabOutcome, OutputKind, PropertyId, PropertyValue, Resolution,
};
use common::{open, open_with, wait_until, ScriptedCamera};

const SHORT: Duration = Duration::from_millis(20);

fn timed(timeout: Duration) -> CaptureSettings {
    CaptureSettings {
        grab_timeout: Some(timeout),
        ..CaptureSettings::default()
    }
}

#[test]
fn test_grab_succeeds_only_after_a_delivery() {
    let camera = ScriptedCamera::new(Resolution::new(4, 2), "yuv420sp");
    let mut capture = open_with(&camera, timed(SHORT));

    assert!(!capture.grab(), "nothing delivered yet");

    assert!(camera.push(&camera.frame(1)));
    assert!(capture.grab());
    assert!(!capture.grab(), "no delivery since the last grab");

    camera.push(&camera.frame(2));
    camera.push(&camera.frame(3));
    assert!(capture.grab());
    assert!(!capture.grab());

    let stats = capture.stats();
    assert_eq!(stats.frames_received, 3);
    assert_eq!(stats.frames_grabbed, 2);
    assert_eq!(stats.frames_overwritten, 1);
}

#[test]
fn test_caches_invalid_after_grab_until_retrieve() {
    let camera = ScriptedCamera::new(Resolution::new(4, 2), "yuv420sp");
    let mut capture = open(&camera);

    camera.push(&camera.frame(100));
    assert!(capture.grab());
    for kind in OutputKind::ALL {
        assert!(!capture.is_cached(kind));
    }

    capture.retrieve(OutputKind::Grayscale).unwrap();
    capture.retrieve(OutputKind::ColorRgb).unwrap();
    assert!(capture.is_cached(OutputKind::Grayscale));
    assert!(capture.is_cached(OutputKind::ColorRgb));

    camera.push(&camera.frame(101));
    assert!(capture.grab());
    assert!(!capture.is_cached(OutputKind::Grayscale));
    assert!(!capture.is_cached(OutputKind::ColorRgb));
}

#[test]
fn test_repeated_retrieve_reuses_cached_result() {
    let camera = ScriptedCamera::new(Resolution::new(4, 2), "yuv420sp");
    let mut capture = open(&camera);
    camera.push(&camera.frame(90));
    capture.grab();

    let first = capture.retrieve(OutputKind::ColorBgr).unwrap().unwrap();
    let (first_ptr, first_bytes) = (first.data.as_ptr(), first.data.to_vec());
    let second = capture.retrieve(OutputKind::ColorBgr).unwrap().unwrap();

    assert_eq!(second.data.as_ptr(), first_ptr);
    assert_eq!(second.data, first_bytes.as_slice());
    assert_eq!(capture.conversion_count(), 1);
}

#[test]
fn test_bgr_then_bgra_are_converted_separately() {
    let camera = ScriptedCamera::new(Resolution::new(4, 2), "yuv420sp");
    let mut capture = open(&camera);
    camera.push(&camera.frame(128));
    capture.grab();

    let bgr = capture.retrieve(OutputKind::ColorBgr).unwrap().unwrap();
    assert_eq!(bgr.channels(), 3);
    assert_eq!(bgr.data.len(), 4 * 2 * 3);
    let bgr_pixel = bgr.pixel(0, 0).unwrap().to_vec();

    let bgra = capture.retrieve(OutputKind::ColorBgra).unwrap().unwrap();
    assert_eq!(bgra.channels(), 4);
    assert_eq!(bgra.data.len(), 4 * 2 * 4);
    assert_eq!(&bgra.pixel(0, 0).unwrap()[..3], bgr_pixel.as_slice());
    assert_eq!(bgra.pixel(0, 0).unwrap()[3], 255);
    assert_eq!(capture.conversion_count(), 2);
}

#[test]
fn test_wrong_size_delivery_leaves_state_and_frame_intact() {
    let camera = ScriptedCamera::new(Resolution::MEDIUM, "yuv420sp");
    let mut capture = open_with(&camera, timed(SHORT));
    assert_eq!(camera.frame(0).len(), 460_800);

    camera.push(&camera.frame(42));
    assert!(capture.grab());
    assert_eq!(capture.state(), CaptureState::FrameGrabbed);

    assert!(!camera.push(&[7u8; 1000]));
    assert_eq!(capture.state(), CaptureState::FrameGrabbed);
    assert_eq!(capture.stats().frames_rejected, 1);
    assert!(!capture.grab(), "a rejected buffer is not a new frame");

    let gray = capture.retrieve(OutputKind::Grayscale).unwrap().unwrap();
    assert!(gray.data.iter().all(|&b| b == 42));
}

#[test]
fn test_size_change_discards_frame_at_old_size() {
    let camera = ScriptedCamera::new(Resolution::new(4, 2), "yuv420sp");
    let mut capture = open_with(&camera, timed(SHORT));

    camera.push(&camera.frame(1));
    assert_eq!(capture.state(), CaptureState::NewFrameUnclaimed);

    assert!(capture.set_property(PropertyId::FrameWidth, 8.0).unwrap());
    assert!(capture.set_property(PropertyId::FrameHeight, 4.0).unwrap());
    assert_eq!(camera.applied_count(), 0, "applied lazily by the next grab");

    assert_eq!(capture.grab_next(), GrabOutcome::TimedOut);
    assert_eq!(camera.applied_count(), 1);
    assert_eq!(capture.state(), CaptureState::NoFrame);
    assert_eq!(camera.resolution(), Resolution::new(8, 4));

    // old-size buffers are now rejected, new-size ones accepted
    assert!(!camera.push(&[1u8; 12]));
    assert!(camera.push(&camera.frame(2)));
    assert!(capture.grab());
    assert_eq!(capture.current_resolution(), Some(Resolution::new(8, 4)));
    assert_eq!(
        capture.property(PropertyId::FrameWidth).unwrap(),
        PropertyValue::Number(8.0)
    );
}

#[test]
fn test_invalid_size_values_are_refused() {
    let camera = ScriptedCamera::new(Resolution::new(4, 2), "yuv420sp");
    let mut capture = open_with(&camera, timed(SHORT));

    for bad in [5e9, -1.0, 0.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            capture.set_property(PropertyId::FrameWidth, bad),
            Err(CameraError::InvalidPropertyValue {
                id: PropertyId::FrameWidth,
                ..
            })
        ));
    }
    assert!(capture.set_property(PropertyId::FrameHeight, 5e9).is_err());

    assert_eq!(capture.grab_next(), GrabOutcome::TimedOut);
    assert_eq!(camera.applied_count(), 0, "a refused value schedules nothing");
    assert_eq!(camera.resolution(), Resolution::new(4, 2));
    assert!(camera.push(&camera.frame(1)));
    assert!(capture.grab());
}

#[test]
fn test_unaddressable_frame_size_keeps_capture_usable() {
    let camera = ScriptedCamera::new(Resolution::new(4, 2), "yuv420sp");
    let mut capture = open_with(&camera, timed(SHORT));
    let max = u32::MAX as f64;

    assert!(capture.set_property(PropertyId::FrameWidth, max).unwrap());
    assert!(capture.set_property(PropertyId::FrameHeight, max).unwrap());
    assert_eq!(capture.grab_next(), GrabOutcome::TimedOut);

    assert!(!camera.push(&[1u8; 12]));
    assert_eq!(capture.stats().frames_rejected, 1);
    assert!(capture.is_opened());
    assert_eq!(
        capture.property(PropertyId::FrameWidth).unwrap(),
        PropertyValue::Number(max)
    );

    capture.set_property(PropertyId::FrameWidth, 4.0).unwrap();
    capture.set_property(PropertyId::FrameHeight, 2.0).unwrap();
    assert_eq!(capture.grab_next(), GrabOutcome::TimedOut);
    assert!(camera.push(&camera.frame(7)));
    assert!(capture.grab());
}

#[test]
fn test_auto_grab_toggle_keeps_pending_frame() {
    let camera = ScriptedCamera::new(Resolution::new(4, 2), "yuv420sp");
    let mut capture = open(&camera);
    camera.push(&camera.frame(5));

    assert!(capture.set_property(PropertyId::AutoGrab, 1.0).unwrap());
    assert!(capture.grab());
    assert_eq!(camera.applied_count(), 0);
}

#[test]
fn test_shutdown_releases_blocked_consumer() {
    let camera = ScriptedCamera::new(Resolution::new(4, 2), "yuv420sp");
    let mut capture = open(&camera);
    let handle = capture.shutdown_handle();

    let consumer = thread::spawn(move || {
        let outcome = capture.grab_next();
        drop(capture);
        outcome
    });

    wait_until("consumer to block", || handle.is_waiting());
    handle.shutdown();

    assert_eq!(consumer.join().unwrap(), GrabOutcome::Closed);
    assert!(!camera.is_connected());
}

#[test]
fn test_teardown_during_concurrent_delivery() {
    let camera = ScriptedCamera::new(Resolution::new(64, 48), "yuv420sp");
    let mut capture = open(&camera);

    let producer = {
        let camera = Arc::clone(&camera);
        thread::spawn(move || {
            let frame = camera.frame(9);
            let mut accepted = 0u64;
            while camera.push(&frame) {
                accepted += 1;
            }
            accepted
        })
    };

    wait_until("first delivery", || capture.stats().frames_received > 0);
    assert!(capture.grab());
    drop(capture);

    let accepted = producer.join().unwrap();
    assert!(accepted >= 1);
    assert!(!camera.push(&camera.frame(9)));
}

#[test]
fn test_connect_failure_produces_no_capture() {
    let camera = ScriptedCamera::refusing(DeviceError::Native(-13));
    let device: Arc<dyn CameraDevice> = camera.clone();

    let err = CameraCapture::open(device, CaptureSettings::default()).unwrap_err();
    assert!(matches!(err, CameraError::ConnectFailed { camera_id: 0, .. }));
    assert!(err.to_string().contains("camera 0"));
    assert!(!camera.push(&camera.frame(0)));
}

#[test]
fn test_unknown_preview_format_fails_gracefully() {
    let camera = ScriptedCamera::new(Resolution::new(4, 2), "rgb565");
    let mut capture = open(&camera);
    camera.push(&camera.frame(50));
    assert!(capture.grab());

    for kind in OutputKind::ALL {
        assert!(capture.retrieve(kind).unwrap().is_none());
    }
}

#[test]
fn test_odd_dimensions_rejected_for_color_only() {
    let camera = ScriptedCamera::new(Resolution::new(3, 3), "yuv420sp");
    let mut capture = open(&camera);
    camera.push(&camera.frame(60));
    assert!(capture.grab());

    let gray = capture.retrieve(OutputKind::Grayscale).unwrap().unwrap();
    assert_eq!(gray.data.len(), 9);
    assert!(matches!(
        capture.retrieve(OutputKind::ColorBgr),
        Err(CameraError::OddDimensions {
            width: 3,
            height: 3
        })
    ));
}
