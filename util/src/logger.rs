//! Logger shared by the fleet executables
//!
//! Every line is tagged with the session time and the name of the executable, so that the logs
//! of the controller and the simulator can be merged and still told apart. The console output is
//! coloured by level while the session log file is kept plain.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::Colorize;
use log::{self, info, Level};
use std::fmt::Display;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level at least as verbose as `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Error opening the session log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this session.
///
/// `min_level` must be at least as verbose as `Info`. Only call this once per process, a second
/// call fails as the global logger is already set.
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let console_name = session.exec_name.clone();
    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}",
                format_line(
                    &console_name,
                    session::get_elapsed_seconds(),
                    level_colour(record.level()),
                    record.level(),
                    record.target(),
                    message
                )
            ))
        })
        .chain(std::io::stdout());

    let file_name = session.exec_name.clone();
    let file = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}",
                format_line(
                    &file_name,
                    session::get_elapsed_seconds(),
                    level_tag(record.level()),
                    record.level(),
                    record.target(),
                    message
                )
            ))
        })
        .chain(log_file);

    fern::Dispatch::new()
        .level(min_level)
        .level_for("zmq", LevelFilter::Info)
        .chain(console)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised for {}", session.exec_name);
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Format a single log line.
///
/// Debug and trace lines also carry the module they came from.
fn format_line<T: Display, M: Display>(
    exec_name: &str,
    elapsed_s: f64,
    tag: T,
    level: Level,
    target: &str,
    message: M
) -> String {
    if level > Level::Info {
        format!("[{:10.6} {} {}] {} ({})", elapsed_s, exec_name, tag, message, target)
    }
    else {
        format!("[{:10.6} {} {}] {}", elapsed_s, exec_name, tag, message)
    }
}

/// Three letter tag for a level
fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info  => "INF",
        Level::Warn  => "WRN",
        Level::Error => "ERR"
    }
}

fn level_colour(level: Level) -> colored::ColoredString {
    let tag = level_tag(level);

    match level {
        Level::Trace => tag.dimmed().italic(),
        Level::Debug => tag.dimmed(),
        Level::Info  => tag.normal(),
        Level::Warn  => tag.yellow(),
        Level::Error => tag.red().bold()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_info_line_omits_target() {
        let line = format_line(
            "ctrl_exec", 1.5, level_tag(Level::Info), Level::Info, "ctrl_lib::coordinator", "hello"
        );
        assert_eq!(line, "[  1.500000 ctrl_exec INF] hello");
    }

    #[test]
    fn test_debug_line_has_target() {
        let line = format_line(
            "fleet_sim", 0.25, level_tag(Level::Debug), Level::Debug, "ctrl_lib::seg_ctrl",
            format_args!("{}: advanced to step {}", "r1", 2)
        );
        assert_eq!(
            line,
            "[  0.250000 fleet_sim DBG] r1: advanced to step 2 (ctrl_lib::seg_ctrl)"
        );
    }

    #[test]
    fn test_level_tags_distinct() {
        let tags: Vec<_> = [Level::Trace, Level::Debug, Level::Info, Level::Warn, Level::Error]
            .iter()
            .map(|l| level_tag(*l))
            .collect();

        for (i, a) in tags.iter().enumerate() {
            assert_eq!(a.len(), 3);
            assert!(tags.iter().skip(i + 1).all(|b| a != b));
        }
    }
}
