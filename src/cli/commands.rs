//! Subcommand handlers.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

use super::args::{ConfigAction, RunArgs};
use crate::camera::{
    CameraCapture, CameraDevice, CameraError, CaptureSettings, CaptureStats, GrabOutcome,
    ImageView, OutputKind, PropertyId, Resolution, ShutdownHandle, SyntheticCamera,
    SyntheticSettings,
};
use crate::config::{self, Config, ConfigError};

/// Errors surfaced by the command handlers.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a run needs, merged from the config file and the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub frames: u64,
    pub output: OutputKind,
    pub camera: SyntheticSettings,
    pub settings: CaptureSettings,
    /// Frame size to switch to halfway through
    pub resize: Option<Resolution>,
}

impl RunOptions {
    /// Command line values win over the config file.
    pub fn new(args: &RunArgs, config: &Config) -> Self {
        let mut settings = config.capture_settings();
        if let Some(camera) = args.camera {
            settings.camera_id = camera;
        }
        if let Some(timeout_ms) = args.timeout_ms {
            settings.grab_timeout = Some(std::time::Duration::from_millis(timeout_ms));
        }
        settings.copy_gray |= args.copy_gray;
        settings.auto_grab |= args.auto_grab;

        let camera = SyntheticSettings {
            resolution: args
                .resolution
                .unwrap_or(Resolution::new(config.camera.width, config.camera.height)),
            fps: args.fps.unwrap_or(config.camera.fps),
            preview_format: args
                .preview_format
                .clone()
                .unwrap_or_else(|| config.camera.preview_format.clone()),
            ..SyntheticSettings::default()
        };

        Self {
            frames: args.frames,
            output: args.output.into(),
            camera,
            settings,
            resize: args.resize,
        }
    }
}

/// Summary of the last decoded frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSummary {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub mean: f64,
    /// First 16 bytes of the SHA256 of the pixel data, hex encoded
    pub checksum: String,
}

impl FrameSummary {
    pub fn of(view: &ImageView<'_>) -> Self {
        let sum: u64 = view.data.iter().map(|&b| b as u64).sum();
        let mean = if view.data.is_empty() {
            0.0
        } else {
            sum as f64 / view.data.len() as f64
        };
        Self {
            width: view.width(),
            height: view.height(),
            channels: view.channels(),
            mean,
            checksum: fingerprint(view.data),
        }
    }
}

/// Same pixels always give the same fingerprint.
fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Result of a `run`, printed as text or JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub camera_id: i32,
    pub output: String,
    pub frames_requested: u64,
    pub frames_grabbed: u64,
    pub frames_decoded: u64,
    pub timeouts: u64,
    pub pixel_format: Option<String>,
    pub last_frame: Option<FrameSummary>,
    pub interrupted: bool,
    pub stats: CaptureStats,
}

impl RunReport {
    fn new(options: &RunOptions) -> Self {
        Self {
            camera_id: options.settings.camera_id,
            output: options.output.to_string(),
            frames_requested: options.frames,
            frames_grabbed: 0,
            frames_decoded: 0,
            timeouts: 0,
            pixel_format: None,
            last_frame: None,
            interrupted: false,
            stats: CaptureStats::default(),
        }
    }

    pub fn print(&self) {
        println!(
            "Grabbed {}/{} frames as {} ({} decoded, {} timeouts)",
            self.frames_grabbed, self.frames_requested, self.output, self.frames_decoded, self.timeouts
        );
        match &self.pixel_format {
            Some(format) => println!("Pixel format: {}", format),
            None => println!("Pixel format: unresolved"),
        }
        if let Some(frame) = &self.last_frame {
            println!(
                "Last frame: {}x{}, {} channel(s), mean {:.1}, checksum {}",
                frame.width, frame.height, frame.channels, frame.mean, frame.checksum
            );
        }
        println!(
            "FRAMES received: {} grabbed: {} rejected: {} overwritten: {}",
            self.stats.frames_received,
            self.stats.frames_grabbed,
            self.stats.frames_rejected,
            self.stats.frames_overwritten
        );
        if self.interrupted {
            println!("Interrupted before all frames were grabbed.");
        }
    }
}

/// Open a synthetic camera and grab `options.frames` frames.
///
/// `on_open` receives a handle that stops the run from another thread.
pub fn capture_frames<F>(options: &RunOptions, on_open: F) -> Result<RunReport, CliError>
where
    F: FnOnce(ShutdownHandle),
{
    let device: Arc<dyn CameraDevice> = Arc::new(SyntheticCamera::new(options.camera.clone()));
    let mut capture = CameraCapture::open(device, options.settings.clone())?;
    let shutdown = capture.shutdown_handle();
    on_open(shutdown.clone());

    let mut report = RunReport::new(options);
    let resize_at = options.frames / 2;

    for index in 0..options.frames {
        if shutdown.is_shutdown() {
            break;
        }
        if let Some(size) = options.resize.filter(|_| index == resize_at) {
            log::info!("Requesting frame size {}", size);
            capture.set_property(PropertyId::FrameWidth, size.width as f64)?;
            capture.set_property(PropertyId::FrameHeight, size.height as f64)?;
        }

        match capture.grab_next() {
            GrabOutcome::Grabbed => report.frames_grabbed += 1,
            GrabOutcome::TimedOut => {
                log::warn!("Timed out waiting for frame {}", index);
                report.timeouts += 1;
                continue;
            }
            GrabOutcome::Closed => break,
        }

        if let Some(view) = capture.retrieve(options.output)? {
            report.frames_decoded += 1;
            report.last_frame = Some(FrameSummary::of(&view));
        }
    }

    report.interrupted = shutdown.is_shutdown();
    report.pixel_format = capture.pixel_format().map(|format| format!("{:?}", format));
    report.stats = capture.stats();
    Ok(report)
}

/// Run the `run` subcommand: grab frames until done or Ctrl+C.
pub fn run(args: &RunArgs, config: &Config) -> Result<(), CliError> {
    let options = RunOptions::new(args, config);
    let report = capture_frames(&options, |handle| {
        if let Err(e) = setup_ctrlc_handler(handle) {
            log::warn!("Failed to install Ctrl+C handler: {}", e);
        }
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }
    Ok(())
}

/// Release a blocked grab and stop the run on Ctrl+C.
pub fn setup_ctrlc_handler(handle: ShutdownHandle) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, shutting down...");
        handle.shutdown();
    })
}

/// Handle config subcommand actions.
pub fn handle_config_action(
    action: &ConfigAction,
    config: &Config,
    config_path: &Path,
) -> Result<(), CliError> {
    match action {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!();
            print!("{}", config.to_toml()?);
            println!();
            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
        }
        ConfigAction::Init { force } => {
            config::write_default(config_path, *force)?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}
