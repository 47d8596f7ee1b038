use std::error::Error as StdError;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type Result<T> = core::result::Result<T, Error>;

/// Error raised at the HTTP boundary, before anything reaches the broadcast path.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: WebErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// Submitted event carried no data.
    EmptyData,
    /// Body declared as JSON could not be decoded into an event.
    InvalidJson,
}

impl Error {
    pub fn empty_data() -> Self {
        Error {
            source: None,
            error_kind: WebErrorKind::EmptyData,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.error_kind, &self.source) {
            (WebErrorKind::EmptyData, _) => write!(f, "data should not be empty"),
            (WebErrorKind::InvalidJson, Some(source)) => write!(f, "{source}"),
            (WebErrorKind::InvalidJson, None) => write!(f, "invalid JSON body"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// Every boundary error is the client's fault.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, format!("failed: {self}")).into_response()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: WebErrorKind::InvalidJson,
        }
    }
}
