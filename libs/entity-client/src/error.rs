use crate::client::Operation;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{operation}: expected HTTP {expected}, got {actual}")]
    UnexpectedStatus {
        operation: Operation,
        expected: StatusCode,
        actual: StatusCode,
        body: String,
    },

    #[error("{operation}: response does not echo the submitted fields (sent {expected}, got {actual})")]
    FieldMismatch {
        operation: Operation,
        expected: Value,
        actual: Value,
    },

    #[error("{operation}: request timed out{}", .after.map(|d| format!(" after {d:?}")).unwrap_or_default())]
    Timeout {
        operation: Operation,
        after: Option<Duration>,
    },

    #[error("{operation}: transport error: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: invalid JSON response: {source}")]
    Decode {
        operation: Operation,
        #[source]
        source: serde_json::Error,
    },

    #[error("request body must serialize to a JSON object")]
    InvalidBody,

    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl Error {
    /// Status code returned by the backend, when the failure was a status mismatch.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::UnexpectedStatus { actual, .. } => Some(*actual),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::UnexpectedStatus { operation, .. }
            | Self::FieldMismatch { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Decode { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}
