use events::DecodeError;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum ClientError {
    /// Transport failure while connecting or reading.
    Request(reqwest::Error),
    /// The server answered, but not with an event stream.
    InvalidResponse { status: u16, content_type: String },
    Decode(DecodeError),
    /// Consecutive connection failures exceeded the reconnect policy.
    TooManyReconnects,
    /// The client closed before its first connection was validated.
    NeverConnected,
    AlreadyStarted,
    Timeout(Duration),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientError::Request(e) => write!(f, "failed to connect: {e}"),
            ClientError::InvalidResponse {
                status,
                content_type,
            } => write!(
                f,
                "invalid SSE response: status {status}, content-type {content_type}"
            ),
            ClientError::Decode(e) => write!(f, "{e}"),
            ClientError::TooManyReconnects => {
                write!(f, "closing client due to too many reconnection attempts")
            }
            ClientError::NeverConnected => write!(f, "client closed before connecting"),
            ClientError::AlreadyStarted => write!(f, "client already started"),
            ClientError::Timeout(after) => write!(f, "timed out after {after:?}"),
        }
    }
}

impl StdError for ClientError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ClientError::Request(e) => Some(e),
            ClientError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Request(err)
    }
}

impl From<DecodeError> for ClientError {
    fn from(err: DecodeError) -> Self {
        ClientError::Decode(err)
    }
}

/// Rejected observer configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ObserverError {
    InvalidLimit(usize),
}

impl fmt::Display for ObserverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObserverError::InvalidLimit(limit) => {
                write!(f, "limit should never be below 1, got {limit}")
            }
        }
    }
}

impl StdError for ObserverError {}
