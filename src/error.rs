//! Error types for Pulse

use std::fmt;

/// Result type alias for Pulse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Pulse
///
/// A missing validation rule is not an error: rule lookups return `Ok(None)`.
#[derive(Debug)]
pub enum Error {
    /// Record or rule could not be durably committed or read back
    Storage(String),
    /// Object store errors
    ObjectStore(object_store::Error),
    /// Label set could not be encoded
    Serialization(String),
    /// Malformed inbound message or backend response body
    Decode(String),
    /// Numeric string in a backend response is not a valid number
    Parse { value: String, reason: String },
    /// Time-series backend rejected the request or could not be reached
    Backend { status: Option<u16>, message: String },
    /// Message broker client errors
    Broker(String),
    /// Configuration errors
    Config(String),
    /// Request rejected before reaching storage or the backend
    InvalidRequest(String),
    /// IO errors
    Io(std::io::Error),
}

impl Error {
    /// True for failures of the storage layer (record or rule store).
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::ObjectStore(_))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ObjectStore(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::ObjectStore(e) => write!(f, "Object store error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
            Error::Parse { value, reason } => {
                write!(f, "Parse error: invalid sample value '{}': {}", value, reason)
            }
            Error::Backend {
                status: Some(status),
                message,
            } => write!(f, "Backend error (HTTP {}): {}", status, message),
            Error::Backend {
                status: None,
                message,
            } => write!(f, "Backend error: {}", message),
            Error::Broker(msg) => write!(f, "Broker error: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl From<object_store::Error> for Error {
    fn from(e: object_store::Error) -> Self {
        Error::ObjectStore(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Backend {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[cfg(feature = "kafka")]
impl From<rdkafka::error::KafkaError> for Error {
    fn from(e: rdkafka::error::KafkaError) -> Self {
        Error::Broker(e.to_string())
    }
}
