use std::error::Error as StdError;

use thiserror::Error;

use crate::record::ValidationError;

/// Lyricist's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Lyricist's crate-wide error type.
///
/// Each variant is one failure kind a caller can branch on. Storage and model-provider
/// errors are normalized into these variants rather than leaking their native types.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing, empty, or oversized pipeline input.
    #[error("{0}")]
    InvalidInput(String),

    /// A record failed field validation before any write happened.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The model replied, but no JSON object could be recovered from the reply.
    #[error("model response was malformed: {message}")]
    ModelResponseMalformed {
        message: String,
        raw_response: String,
    },

    /// The network call to the completion provider failed or returned an error status.
    #[error("completion call failed: {message}")]
    TranslationCallFailed {
        message: String,
        raw_response: Option<String>,
    },

    #[error("translation '{0}' not found")]
    NotFound(String),

    /// The acting user does not own the record.
    #[error("translation '{0}' is owned by another user")]
    Unauthorized(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn call_failed(message: impl Into<String>, raw_response: Option<String>) -> Self {
        Self::TranslationCallFailed {
            message: message.into(),
            raw_response,
        }
    }

    /// Stable, tagged name of this failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid-input",
            Self::Validation(err) => err.code(),
            Self::ModelResponseMalformed { .. } => "model-response-malformed",
            Self::TranslationCallFailed { .. } => "translation-call-failed",
            Self::NotFound(_) => "not-found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Other(_) => "failure",
        }
    }

    /// Raw provider or model text attached for diagnosis, if any.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::ModelResponseMalformed { raw_response, .. } => Some(raw_response),
            Self::TranslationCallFailed { raw_response, .. } => raw_response.as_deref(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::invalid_input("x").code(), "invalid-input");
        assert_eq!(
            Error::from(ValidationError::InvalidTitle).code(),
            "invalid-title"
        );
        assert_eq!(Error::NotFound("a".into()).code(), "not-found");
        assert_eq!(Error::Unauthorized("a".into()).code(), "unauthorized");
    }

    #[test]
    fn raw_response_is_exposed_for_model_failures() {
        let err = Error::ModelResponseMalformed {
            message: "expected value".into(),
            raw_response: "not json".into(),
        };
        assert_eq!(err.raw_response(), Some("not json"));

        let err = Error::call_failed("boom", None);
        assert_eq!(err.raw_response(), None);
    }
}
