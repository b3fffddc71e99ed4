use thiserror::Error;

use crate::config::ConfigError;
use crate::sensor::SensorError;

/// Everything that ends a logging run early.
///
/// Notification failures are not part of this: they are reported by the
/// notifier and otherwise ignored.
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("sensor fault: {0}")]
    Sensor(#[from] SensorError),

    #[error("log file: {0}")]
    LogFile(#[from] std::io::Error),

    #[error("csv encoding: {0}")]
    Csv(#[from] csv::Error),

    #[error("no connectivity after {attempts} attempts")]
    Connectivity { attempts: u32 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
