//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{parse_fps, parse_resolution, Args, Command, ConfigAction, RunArgs};
pub use commands::{
    capture_frames, handle_config_action, run, setup_ctrlc_handler, CliError, FrameSummary,
    RunOptions, RunReport,
};
pub use enums::{LogLevel, OutputArg};
