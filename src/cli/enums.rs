//! CLI enum types for output kind and log level options.

use clap::ValueEnum;
use log::LevelFilter;

use crate::camera::OutputKind;

/// Decoded output representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputArg {
    Gray,
    #[default]
    Bgr,
    Rgb,
    Bgra,
    Rgba,
}

impl From<OutputArg> for OutputKind {
    fn from(o: OutputArg) -> Self {
        match o {
            OutputArg::Gray => OutputKind::Grayscale,
            OutputArg::Bgr => OutputKind::ColorBgr,
            OutputArg::Rgb => OutputKind::ColorRgb,
            OutputArg::Bgra => OutputKind::ColorBgra,
            OutputArg::Rgba => OutputKind::ColorRgba,
        }
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
