use std::str::FromStr;

use log::{LevelFilter, Log, Metadata, Record};
use serde::{Deserialize, Serialize};

use crate::error::WeightError;

/// Minimum severity passed to the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    fn filter(&self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = WeightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(WeightError::Precondition(format!(
                "unknown log level: {other}"
            ))),
        }
    }
}

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!(
            "[{}] [{}] {}",
            jiff::Zoned::now().strftime("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Install the stderr logger. Later calls only adjust the level.
pub fn init_logging(level: LogLevel) {
    if log::set_logger(&LOGGER).is_err() {
        eprintln!("Warning: Logging system already initialized");
    }
    log::set_max_level(level.filter());
}

/// Log WeightError with automatic error-level logging
pub fn log_weight_error(error: &WeightError, context: Option<&str>) {
    let message = match context {
        Some(ctx) => format!("{}: {}", ctx, error),
        None => error.to_string(),
    };

    log::error!("{message}");
}

/// Result extension for convenient error logging
pub trait ResultExt<T, E> {
    fn log_error(self, context: Option<&str>) -> Self;
}

impl<T> ResultExt<T, WeightError> for Result<T, WeightError> {
    fn log_error(self, context: Option<&str>) -> Self {
        if let Err(ref error) = self {
            log_weight_error(error, context);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_mixed_case_level_when_parsing_then_level_is_recognized() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("verbose".parse::<LogLevel>().is_err());
    }
}
