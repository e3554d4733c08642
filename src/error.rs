use std::fmt;

use chrono::{DateTime, Utc};

/// A failure reported by the Hydrawise API itself, or a call that the
/// binding refuses to make (cloud-only endpoint on a local binding).
#[derive(Debug, Clone, PartialEq)]
pub struct CommandError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.message, self.timestamp.to_rfc3339())
    }
}

#[derive(Debug)]
pub enum Error {
    Command(CommandError),
    Http(reqwest::Error),
    InvalidConfig(String),
    Protocol(String),
    Detached,
    Io(std::io::Error),
}

impl Error {
    pub(crate) fn command(message: impl Into<String>) -> Self {
        Error::Command(CommandError::new(message))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Command(e) => write!(f, "command error: {e}"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Detached => write!(f, "API binding has been dropped"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Error::Command(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
