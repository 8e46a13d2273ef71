use std::fmt;

use config_yaml::ConfigError;

/// The request-handling error taxonomy from the design's error handling
/// section. Each variant maps to exactly one HTTP status; constructing one
/// and handing it to the response emitter is the only way a request path
/// produces an error response.
#[derive(Debug)]
pub enum Error {
    Malformed(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Timeout(String),
    MethodNotImplemented(String),
    FeatureUnavailable(String),
    Overloaded(String),
    Internal(String),
}

impl Error {
    pub fn status(&self) -> u16 {
        match self {
            Error::Malformed(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::Timeout(_) => 408,
            Error::MethodNotImplemented(_) | Error::FeatureUnavailable(_) => 501,
            Error::Overloaded(_) => 503,
            Error::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Malformed(m)
            | Error::Unauthorized(m)
            | Error::Forbidden(m)
            | Error::NotFound(m)
            | Error::Timeout(m)
            | Error::MethodNotImplemented(m)
            | Error::FeatureUnavailable(m)
            | Error::Overloaded(m)
            | Error::Internal(m) => m,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.status())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Internal(e.to_string())
    }
}

impl From<std::net::AddrParseError> for Error {
    fn from(e: std::net::AddrParseError) -> Self {
        Error::Internal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
