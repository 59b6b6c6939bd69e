//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::{LogLevel, OutputArg};
use crate::camera::Resolution;

/// Grab frames from a push-style camera through a pull-style capture API
#[derive(Parser, Debug)]
#[command(name = "camgrab")]
#[command(version, about = "Pull-style frame grabbing from a push-style camera", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (overrides the config file)
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the synthetic camera and grab frames
    Run(RunArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Number of frames to grab
    #[arg(short = 'n', long, default_value = "30")]
    pub frames: u64,

    /// Output representation to decode each frame into
    #[arg(short, long, default_value = "bgr")]
    pub output: OutputArg,

    /// Camera id (overrides the config file)
    #[arg(long)]
    pub camera: Option<i32>,

    /// Frame size as WIDTHxHEIGHT (overrides the config file)
    #[arg(long, value_parser = parse_resolution)]
    pub resolution: Option<Resolution>,

    /// Frames per second produced by the camera (1-120)
    #[arg(long, value_parser = parse_fps)]
    pub fps: Option<u32>,

    /// Preview format reported by the camera, e.g. yuv420sp or yuv420i
    #[arg(long)]
    pub preview_format: Option<String>,

    /// Give up on a grab after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Switch to this frame size halfway through the run
    #[arg(long, value_parser = parse_resolution)]
    pub resize: Option<Resolution>,

    /// Copy the luma plane for grayscale output instead of borrowing it
    #[arg(long)]
    pub copy_gray: bool,

    /// Keep refreshing the next frame even when nobody is grabbing
    #[arg(long)]
    pub auto_grab: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse and validate resolution (WIDTHxHEIGHT format)
pub fn parse_resolution(s: &str) -> Result<Resolution, String> {
    let (width, height) = s.split_once('x').ok_or_else(|| {
        format!(
            "Invalid resolution format '{}'. Use WIDTHxHEIGHT (e.g., 640x480)",
            s
        )
    })?;
    let width: u32 = width
        .parse()
        .map_err(|_| format!("Invalid width '{}' in resolution", width))?;
    let height: u32 = height
        .parse()
        .map_err(|_| format!("Invalid height '{}' in resolution", height))?;
    if width == 0 || height == 0 {
        return Err("Resolution width and height must be greater than 0".to_string());
    }
    if width > 7680 || height > 4320 {
        return Err("Resolution exceeds maximum supported (7680x4320)".to_string());
    }
    Ok(Resolution::new(width, height))
}

/// Parse and validate framerate (1-120 fps)
pub fn parse_fps(s: &str) -> Result<u32, String> {
    let fps: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid framerate", s))?;
    if !(1..=120).contains(&fps) {
        return Err(format!(
            "Framerate must be between 1 and 120 fps, got {}",
            fps
        ));
    }
    Ok(fps)
}
