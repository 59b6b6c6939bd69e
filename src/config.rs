//! Configuration file handling for camgrab.
//!
//! Loads configuration from `~/.config/camgrab/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::CaptureSettings;

/// Configuration file structure for camgrab.
/// Loaded from ~/.config/camgrab/config.toml (or custom path via --config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub id: i32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Preview format reported by the synthetic camera
    #[serde(default = "default_preview_format")]
    pub preview_format: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            id: 0,
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            preview_format: default_preview_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CaptureConfig {
    /// Give up on a grab after this many milliseconds; absent means wait forever
    #[serde(default)]
    pub grab_timeout_ms: Option<u64>,
    #[serde(default)]
    pub copy_gray: bool,
    #[serde(default)]
    pub auto_grab: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// One of off, error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> u32 {
    30
}

fn default_preview_format() -> String {
    "yuv420sp".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Capture settings described by the `[camera]` and `[capture]` sections.
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            camera_id: self.camera.id,
            grab_timeout: self.capture.grab_timeout_ms.map(Duration::from_millis),
            copy_gray: self.capture.copy_gray,
            auto_grab: self.capture.auto_grab,
        }
    }

    pub fn log_level(&self) -> Result<log::LevelFilter, ConfigError> {
        self.log
            .level
            .parse()
            .map_err(|_| ConfigError::InvalidLogLevel(self.log.level.clone()))
    }
}

/// Errors that can occur when loading or writing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config file '{}' already exists", .0.display())]
    AlreadyExists(PathBuf),
    #[error("Invalid log level '{0}'")]
    InvalidLogLevel(String),
}

/// Commented default configuration written by `camgrab config init`.
pub const DEFAULT_CONFIG: &str = r#"# camgrab configuration

[camera]
# Camera id to open
id = 0
# Requested frame size (both must be even for color output)
width = 640
height = 480
# Frames per second produced by the synthetic camera
fps = 30
# Preview format: yuv420sp (NV21) or yuv420i (NV12)
preview_format = "yuv420sp"

[capture]
# Give up on a grab after this many milliseconds (omit to wait forever)
# grab_timeout_ms = 1000
# Copy the luma plane instead of borrowing it for grayscale output
copy_gray = false
# Keep refreshing the next frame even when nobody is grabbing
auto_grab = false

[log]
# off, error, warn, info, debug, trace
level = "info"
"#;

/// Write [`DEFAULT_CONFIG`] to `path`, creating parent directories.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn write_default(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, DEFAULT_CONFIG).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    log::info!("Wrote default config to {}", path.display());
    Ok(())
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("camgrab").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/camgrab/config.toml")
        })
}
