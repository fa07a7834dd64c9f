//! Crate-wide error type

use crate::protocol::http::RequestError;
use crate::registry::RegistryError;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Underlying socket I/O failure
    Io(std::io::Error),
    /// Registry rejected an operation
    Registry(RegistryError),
    /// Client sent a request we could not parse
    Request(RequestError),
    /// An operation exceeded its configured timeout
    Timeout(&'static str),
    /// Relay answered with a non-success status code
    RemoteStatus(u16),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::Registry(e) => write!(f, "registry error: {}", e),
            Error::Request(e) => write!(f, "bad request: {}", e),
            Error::Timeout(what) => write!(f, "timed out: {}", what),
            Error::RemoteStatus(code) => write!(f, "relay responded with status {}", code),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<RequestError> for Error {
    fn from(e: RequestError) -> Self {
        Error::Request(e)
    }
}
