#![deny(missing_docs)]
//! Shared logging utilities for the forum agent workspace.
//!
//! This crate provides the `forum_*` logging macros used across the codebase,
//! the host-facing logger initialization and a minimal test initializer.

use std::fs::File;
use std::io;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Log file used when the host does not pick one.
pub const DEFAULT_LOG_FILE: &str = "./agent.log";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! forum_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! forum_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! forum_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! forum_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! forum_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// How the agent process logs: the level filter and each enabled sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Most verbose level that is recorded.
    pub level: LevelFilter,
    /// Echo records to the terminal.
    pub terminal: bool,
    /// Log file, truncated when the logger starts. `None` disables file output.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            terminal: true,
            file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}

/// Installs the global logger described by `settings`.
///
/// Fails only when the log file cannot be created. If a logger is already
/// installed the call leaves it in place.
pub fn initialize(settings: &LogSettings) -> io::Result<()> {
    let loggers = build_loggers(settings)?;
    if CombinedLogger::init(loggers).is_err() {
        log::debug!("Logger already installed; keeping it");
    }
    Ok(())
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Another test may have installed the logger already.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

fn build_loggers(settings: &LogSettings) -> io::Result<Vec<Box<dyn SharedLogger>>> {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if let Some(path) = &settings.file {
        let file = File::create(path)?;
        loggers.push(WriteLogger::new(settings.level, config.clone(), file));
    }
    if settings.terminal {
        loggers.push(TermLogger::new(
            settings.level,
            config,
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }
    Ok(loggers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_enabled_sink_gets_a_logger() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = LogSettings {
            level: LevelFilter::Warn,
            terminal: true,
            file: Some(dir.path().join("agent.log")),
        };
        assert_eq!(build_loggers(&settings).unwrap().len(), 2);
        assert!(dir.path().join("agent.log").exists());

        let terminal_only = LogSettings {
            file: None,
            ..settings
        };
        assert_eq!(build_loggers(&terminal_only).unwrap().len(), 1);
    }

    #[test]
    fn unwritable_log_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = LogSettings {
            terminal: false,
            file: Some(dir.path().join("missing").join("agent.log")),
            ..LogSettings::default()
        };
        assert!(build_loggers(&settings).is_err());
    }
}
