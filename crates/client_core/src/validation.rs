//! Client-side checks a workflow file must pass before it may be uploaded.
//!
//! Every check is a pure function of the file name or bytes. The pipeline
//! runs them in a fixed order and stops at the first failure.

use serde::de::IgnoredAny;
use thiserror::Error;

pub const MAX_WORKFLOW_FILE_BYTES: u64 = 1_048_576;

pub const EXTENSION_MESSAGE: &str = "Only .json workflow files are allowed";
pub const PATH_SEPARATOR_MESSAGE: &str = "File name must not contain path separators";
pub const NAME_PATTERN_MESSAGE: &str =
    "File name may only contain letters, numbers, hyphens, and underscores, followed by .json";
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON syntax in workflow file";
pub const READ_FAILURE_MESSAGE: &str = "Failed to read file";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0}")]
    InvalidName(String),
    #[error("{0}")]
    InvalidSize(String),
    #[error("{0}")]
    InvalidContent(String),
}

impl ValidationError {
    pub fn reason(&self) -> &str {
        match self {
            Self::InvalidName(reason) | Self::InvalidSize(reason) | Self::InvalidContent(reason) => {
                reason
            }
        }
    }
}

pub type ValidationOutcome = Result<(), ValidationError>;

pub fn size_limit_message() -> String {
    format!("File exceeds the maximum size of 1 MB ({MAX_WORKFLOW_FILE_BYTES} bytes)")
}

/// Extension, path separator and character-set checks, in that order.
pub fn validate_name(file_name: &str) -> ValidationOutcome {
    if !file_name.ends_with(".json") {
        return Err(ValidationError::InvalidName(EXTENSION_MESSAGE.to_string()));
    }
    if file_name.contains('/') || file_name.contains('\\') {
        return Err(ValidationError::InvalidName(
            PATH_SEPARATOR_MESSAGE.to_string(),
        ));
    }
    let stem = &file_name[..file_name.len() - ".json".len()];
    let allowed = !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !allowed {
        return Err(ValidationError::InvalidName(NAME_PATTERN_MESSAGE.to_string()));
    }
    Ok(())
}

pub fn validate_size(size_bytes: u64) -> ValidationOutcome {
    if size_bytes > MAX_WORKFLOW_FILE_BYTES {
        return Err(ValidationError::InvalidSize(size_limit_message()));
    }
    Ok(())
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text decoding drops a leading UTF-8 byte order mark before parsing.
pub fn validate_content(bytes: &[u8]) -> ValidationOutcome {
    let text = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    serde_json::from_slice::<IgnoredAny>(text)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidContent(INVALID_JSON_MESSAGE.to_string()))
}

pub fn read_failure() -> ValidationError {
    ValidationError::InvalidContent(READ_FAILURE_MESSAGE.to_string())
}

/// Full pipeline over an in-memory candidate.
pub fn validate_workflow_file(file_name: &str, bytes: &[u8]) -> ValidationOutcome {
    validate_name(file_name)?;
    validate_size(bytes.len() as u64)?;
    validate_content(bytes)
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
