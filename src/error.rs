use std::fmt;

use thiserror::Error;

/// Prefix put in front of every failed reply shown to the user.
pub const ERROR_MARKER: &str = "❌ Erreur LLM";

/// Coarse classification of a failed completion, so callers can branch
/// without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Network,
    Timeout,
    Authentication,
    Backend,
    MalformedResponse,
    Request,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::Network => "network",
            FailureCategory::Timeout => "timeout",
            FailureCategory::Authentication => "authentication",
            FailureCategory::Backend => "backend",
            FailureCategory::MalformedResponse => "malformed response",
            FailureCategory::Request => "request",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong while asking the model for a completion.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("authentication rejected ({status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("backend error: {0}")]
    BackendMessage(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    pub fn category(&self) -> FailureCategory {
        match self {
            LlmError::Network(_) => FailureCategory::Network,
            LlmError::Timeout(_) => FailureCategory::Timeout,
            LlmError::Authentication { .. } => FailureCategory::Authentication,
            LlmError::Backend { .. } | LlmError::BackendMessage(_) => FailureCategory::Backend,
            LlmError::MalformedResponse(_) => FailureCategory::MalformedResponse,
            LlmError::InvalidRequest(_) => FailureCategory::Request,
        }
    }

    /// Render the failure the way it is shown in the chat transcript.
    pub fn reply_text(&self) -> String {
        format!("{} : {}", ERROR_MARKER, self)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else if err.is_decode() {
            LlmError::MalformedResponse(err.to_string())
        } else if err.is_builder() {
            LlmError::InvalidRequest(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for LlmError {
    fn from(err: url::ParseError) -> Self {
        LlmError::InvalidRequest(format!("invalid endpoint URL: {}", err))
    }
}

/// Failures while building a dataset handle or computing its statistics.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset has no numeric columns")]
    NoNumericColumns,

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("expected a JSON array of objects: {0}")]
    NotRecords(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
