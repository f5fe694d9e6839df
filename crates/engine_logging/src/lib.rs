#![deny(missing_docs)]
//! Shared logging utilities for the courier workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! the process logger setup used by the CLI, and a minimal test initializer
//! for the global logger.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Log file written next to the working directory when file logging is enabled.
pub const DEFAULT_LOG_FILE: &str = "kindle-courier.log";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Write to [`DEFAULT_LOG_FILE`] in the current directory.
    File,
    /// Write to terminal (stdout).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Initialize the process logger with the specified destination and level.
///
/// For `LogDestination::File` or `Both`, creates [`DEFAULT_LOG_FILE`] in the
/// current working directory. A file that cannot be created degrades to
/// terminal output (or nothing, for `File`) with a warning on stderr.
pub fn initialize(destination: LogDestination, level: LevelFilter) {
    initialize_with_file(destination, level, Path::new(DEFAULT_LOG_FILE));
}

/// Same as [`initialize`], with an explicit log file path.
pub fn initialize_with_file(destination: LogDestination, level: LevelFilter, log_path: &Path) {
    let loggers = build_loggers(destination, level, log_path);
    if loggers.is_empty() {
        return;
    }
    // A logger may already be installed (tests, embedding); keep the first one.
    let _ = CombinedLogger::init(loggers);
}

fn build_loggers(
    destination: LogDestination,
    level: LevelFilter,
    log_path: &Path,
) -> Vec<Box<dyn SharedLogger>> {
    let config = build_config();
    let terminal = |config: Config| -> Box<dyn SharedLogger> {
        TermLogger::new(level, config, TerminalMode::Mixed, ColorChoice::Auto)
    };

    match destination {
        LogDestination::File => create_file_logger(level, config, log_path)
            .map(|logger| vec![logger as Box<dyn SharedLogger>])
            .unwrap_or_default(),
        LogDestination::Terminal => vec![terminal(config)],
        LogDestination::Both => {
            let mut loggers = vec![terminal(config.clone())];
            if let Some(file_logger) = create_file_logger(level, config, log_path) {
                loggers.push(file_logger);
            }
            loggers
        }
    }
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    level: LevelFilter,
    config: Config,
    log_path: &Path,
) -> Option<Box<WriteLogger<File>>> {
    let log_path = PathBuf::from(log_path);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_destination_builds_terminal_and_file_loggers() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("run.log");
        let loggers = build_loggers(LogDestination::Both, LevelFilter::Info, &path);
        assert_eq!(loggers.len(), 2);
        assert!(path.exists());
    }

    #[test]
    fn unwritable_log_file_degrades_to_terminal_only() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("missing").join("run.log");
        let loggers = build_loggers(LogDestination::Both, LevelFilter::Info, &path);
        assert_eq!(loggers.len(), 1);

        let file_only = build_loggers(LogDestination::File, LevelFilter::Info, &path);
        assert!(file_only.is_empty());
    }
}
