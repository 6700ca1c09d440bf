/*!
 * Top-level error type for the s3nav binary
 */

use crate::config::ConfigError;
use crate::core::navigator::NavError;
use crate::protocol::s3::S3Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, BrowserError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum BrowserError {
    /// Configuration file, flag or log setup problem
    Config(String),

    /// Object store failure
    Store(S3Error),

    /// Navigation request rejected
    Navigation(NavError),

    /// Local source path does not exist
    SourceNotFound(PathBuf),

    /// Could not parse an `s3://bucket/prefix` argument
    InvalidUri(String),

    /// Some files of a batch failed
    PartialUpload { succeeded: usize, failed: usize },

    /// Terminal interaction failed
    Terminal(String),

    Io(io::Error),
}

impl BrowserError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BrowserError::PartialUpload { .. } => EXIT_PARTIAL,
            BrowserError::Store(err) if err.is_cancelled() => EXIT_PARTIAL,
            _ => EXIT_FATAL,
        }
    }
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::Config(msg) => write!(f, "Configuration error: {}", msg),
            BrowserError::Store(err) => write!(f, "{}", err),
            BrowserError::Navigation(err) => write!(f, "Navigation error: {}", err),
            BrowserError::SourceNotFound(path) => {
                write!(f, "Source not found: {}", path.display())
            }
            BrowserError::InvalidUri(msg) => write!(f, "Invalid URI: {}", msg),
            BrowserError::PartialUpload { succeeded, failed } => write!(
                f,
                "{} of {} uploads failed",
                failed,
                succeeded + failed
            ),
            BrowserError::Terminal(msg) => write!(f, "Terminal error: {}", msg),
            BrowserError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::Store(err) => Some(err),
            BrowserError::Navigation(err) => Some(err),
            BrowserError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BrowserError {
    fn from(err: io::Error) -> Self {
        BrowserError::Io(err)
    }
}

impl From<S3Error> for BrowserError {
    fn from(err: S3Error) -> Self {
        match err {
            S3Error::InvalidConfig(msg) => BrowserError::Config(msg),
            other => BrowserError::Store(other),
        }
    }
}

impl From<NavError> for BrowserError {
    fn from(err: NavError) -> Self {
        BrowserError::Navigation(err)
    }
}

impl From<ConfigError> for BrowserError {
    fn from(err: ConfigError) -> Self {
        BrowserError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BrowserError {
    fn from(err: serde_json::Error) -> Self {
        BrowserError::Config(format!("JSON error: {}", err))
    }
}

impl From<dialoguer::Error> for BrowserError {
    fn from(err: dialoguer::Error) -> Self {
        BrowserError::Terminal(err.to_string())
    }
}
