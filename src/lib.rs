//! camgrab library crate.
//!
//! A pull-style `grab` / `retrieve` capture API on top of cameras that push
//! raw YUV 4:2:0 frames from their own thread.

pub mod camera;
pub mod cli;
pub mod config;
pub mod logging;
