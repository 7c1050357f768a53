//! Provides configuration of a logger.
use env_logger::Builder;
use log::trace;
use log::LevelFilter;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Configures the log with the specified verbosity.
///
/// Higher verbosity results in additional log messages
/// up to a maximum verbosity level.
pub fn configure(verbosity: u8, log_file: Option<PathBuf>) -> Result<(), String> {
    let log_level = level(verbosity)?;

    trace!("Logger verbosity {log_level}");

    let mut builder = Builder::new();

    if let Some(log_location) = log_file {
        let file = File::create(&log_location).map_err(|e| {
            format!(
                "Unable to create log file {}. {}",
                log_location.display(),
                e
            )
        })?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}:{} {:?}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                OffsetDateTime::now_utc(),
                record.args()
            )
        })
        .filter_level(log_level)
        .try_init()
        .map_err(|e| format!("Unable to configure logging. {}", e))
}

fn level(verbosity: u8) -> Result<LevelFilter, String> {
    match verbosity {
        0 => Ok(LevelFilter::Error),
        1 => Ok(LevelFilter::Warn),
        2 => Ok(LevelFilter::Info),
        3 => Ok(LevelFilter::Debug),
        4 => Ok(LevelFilter::Trace),
        _ => Err(String::from("Don't be crazy with verbose")),
    }
}
