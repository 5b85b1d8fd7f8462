//! Error types for ClearMind.
//!
//! Library crates use [`ClearMindError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::fmt;
use std::path::PathBuf;

/// Top-level error type for all ClearMind operations.
#[derive(Debug, thiserror::Error)]
pub enum ClearMindError {
    /// No model credential has been saved yet.
    #[error("no model API key is configured")]
    MissingCredential,

    /// The user text trimmed to nothing.
    #[error("input text is empty")]
    EmptyInput,

    /// Attempted to save a blank credential.
    #[error("API key must not be empty")]
    InvalidCredential,

    /// Network, DNS, timeout, or HTTP-status failure (including 401/403).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service envelope carried no candidate text at all.
    #[error("model returned no text")]
    EmptyModelResponse,

    /// Text was present but failed decoding or shape validation.
    ///
    /// `raw` is the offending text. It is kept for diagnostics and never
    /// rendered by `Display`.
    #[error("malformed model response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ClearMindError>;

impl ClearMindError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-response error, keeping the raw text aside.
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for session state and user display.
    ///
    /// Ambient failures (config, storage, I/O) can only surface from the
    /// transport seam, so they are reported as transport errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential => ErrorKind::MissingCredential,
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::InvalidCredential => ErrorKind::InvalidCredential,
            Self::EmptyModelResponse => ErrorKind::EmptyModelResponse,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::Transport(_) | Self::Config { .. } | Self::Storage(_) | Self::Io { .. } => {
                ErrorKind::TransportError
            }
        }
    }

    /// The raw model text attached to a malformed response, if any.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Failure classification carried by `Failed` session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingCredential,
    EmptyInput,
    TransportError,
    EmptyModelResponse,
    MalformedResponse,
    InvalidCredential,
}

impl ErrorKind {
    /// Stable identifier used in logs and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::EmptyInput => "empty_input",
            Self::TransportError => "transport_error",
            Self::EmptyModelResponse => "empty_model_response",
            Self::MalformedResponse => "malformed_response",
            Self::InvalidCredential => "invalid_credential",
        }
    }

    /// Short, calm message for the end user. Never includes model output.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingCredential => "Add your API key to get started.",
            Self::EmptyInput => "Type or paste some text first.",
            Self::TransportError => "Could not reach the AI service. Please try again.",
            Self::EmptyModelResponse => "The AI did not send anything back. Please try again.",
            Self::MalformedResponse => "The AI answer was not in the expected format. Please try again.",
            Self::InvalidCredential => "The API key cannot be empty.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
