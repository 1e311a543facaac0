use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::ErrorPayload;

pub const INVALID_REQUEST_MESSAGE: &str = "Invalid request. Please check your input and try again.";
pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication required. Please sign in again.";
pub const PERMISSION_DENIED_MESSAGE: &str =
    "Permission denied. You do not have access to this resource.";
pub const NOT_FOUND_MESSAGE: &str = "The requested resource was not found.";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please wait a moment and try again.";
pub const SERVER_ERROR_MESSAGE: &str = "Server error. Please try again later.";
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response from server";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    Internal,
    Unknown,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::Validation,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

/// Fixed user-facing text for a status when the server supplied none.
pub fn message_for_status(status: u16) -> String {
    match ErrorCode::from_status(status) {
        ErrorCode::Validation => INVALID_REQUEST_MESSAGE.to_string(),
        ErrorCode::Unauthorized => AUTH_REQUIRED_MESSAGE.to_string(),
        ErrorCode::Forbidden => PERMISSION_DENIED_MESSAGE.to_string(),
        ErrorCode::NotFound => NOT_FOUND_MESSAGE.to_string(),
        ErrorCode::RateLimited => RATE_LIMITED_MESSAGE.to_string(),
        ErrorCode::Internal => SERVER_ERROR_MESSAGE.to_string(),
        ErrorCode::Unknown => format!("Request failed with status {status}"),
    }
}

/// A non-2xx response, resolved to the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{user_message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub http_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_message: Option<String>,
    pub user_message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ApiError {
    pub fn from_status(http_status: u16) -> Self {
        Self {
            code: ErrorCode::from_status(http_status),
            http_status,
            raw_message: None,
            user_message: message_for_status(http_status),
            details: Vec::new(),
        }
    }

    /// A non-empty `error` field wins verbatim; otherwise the status table applies.
    pub fn from_payload(http_status: u16, payload: ErrorPayload) -> Self {
        let mut api_error = Self::from_status(http_status);
        if let Some(message) = payload.error.filter(|message| !message.is_empty()) {
            api_error.user_message = message.clone();
            api_error.raw_message = Some(message);
        }
        api_error.details = payload.details.unwrap_or_default();
        api_error
    }

    /// Resolves an error body that may be empty or not JSON at all.
    pub fn from_body(http_status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorPayload>(body) {
            Ok(payload) => Self::from_payload(http_status, payload),
            Err(_) => Self::from_status(http_status),
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.code == ErrorCode::Unauthorized
    }
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
