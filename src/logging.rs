//! Minimal stderr logger for the `log` facade.
//!
//! Stdout is reserved for command output (`--json` in particular), so log
//! lines go to stderr.

use log::{LevelFilter, Log, Metadata, Record};
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

/// A logger that writes `elapsed [LEVEL] [thread] target - message` lines to stderr.
pub struct StderrLogger {
    started: OnceLock<Instant>,
}

impl StderrLogger {
    const fn new() -> Self {
        Self {
            started: OnceLock::new(),
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.get_or_init(Instant::now).elapsed().as_secs_f64()
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = std::thread::current();
        let line = format_line(
            self.elapsed_secs(),
            record.level(),
            thread.name().unwrap_or("unnamed"),
            record.target(),
            record.args(),
        );
        // a failed stderr write has nowhere else to go
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }

    fn flush(&self) {
        std::io::stderr().flush().ok();
    }
}

fn format_line(
    elapsed: f64,
    level: log::Level,
    thread: &str,
    target: &str,
    message: &std::fmt::Arguments<'_>,
) -> String {
    format!(
        "{:>9.3} [{:<5}] [{}] {} - {}",
        elapsed, level, thread, target, message
    )
}

/// Install the stderr logger with `level` as the max level.
///
/// Only the first call installs the logger; later calls just change the level.
pub fn init(level: LevelFilter) {
    static LOGGER: StderrLogger = StderrLogger::new();

    LOGGER.elapsed_secs();
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
