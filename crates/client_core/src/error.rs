use shared::error::{ApiError, ErrorCode, INVALID_RESPONSE_MESSAGE};
use thiserror::Error;

pub const NETWORK_ERROR_MESSAGE: &str =
    "Unable to reach the server. Check your connection and try again.";

/// Failure of a single RemoteAPI call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The request never completed: connection refused, DNS, reset, timeout.
    #[error("{}", NETWORK_ERROR_MESSAGE)]
    Network { detail: String },
    #[error(transparent)]
    Http(#[from] ApiError),
    /// A 2xx body that did not match the expected shape.
    #[error("{}", INVALID_RESPONSE_MESSAGE)]
    Decode { status: u16, detail: String },
    #[error("install endpoint did not redirect (status {status})")]
    Redirect { status: u16 },
}

impl RequestError {
    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::Network {
            detail: err.to_string(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Http(api_error) => api_error.user_message.clone(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { .. } => None,
            Self::Http(api_error) => Some(api_error.http_status),
            Self::Decode { status, .. } | Self::Redirect { status } => Some(*status),
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Http(api_error) => Some(api_error.code),
            _ => None,
        }
    }
}
