//! Error types for the tag normalization pipeline.

use thiserror::Error;

/// Result type alias using tagnorm's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of characters of offending oracle output kept in errors.
pub const SNIPPET_MAX_CHARS: usize = 200;

/// Core error type for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is missing or invalid (prompt files, settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Oracle transport failed (unreachable, timeout, non-2xx status)
    #[error("Inference error: {0}")]
    Inference(String),

    /// Oracle answered, but not with a JSON array
    #[error("Malformed oracle response from {stage} stage: {snippet}")]
    MalformedResponse { stage: String, snippet: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a malformed-response error, truncating the offending text.
    pub fn malformed(stage: impl Into<String>, text: &str) -> Self {
        Error::MalformedResponse {
            stage: stage.into(),
            snippet: snippet(text),
        }
    }

    /// Whether the error is expected to be recovered at the batch boundary.
    ///
    /// Configuration errors are fatal at startup and are never recovered.
    pub fn is_batch_recoverable(&self) -> bool {
        !matches!(self, Error::Config(_))
    }
}

/// Truncate text to [`SNIPPET_MAX_CHARS`] characters for logging.
pub fn snippet(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(SNIPPET_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing prompt file".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing prompt file");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("Ollama returned 500".to_string());
        assert_eq!(err.to_string(), "Inference error: Ollama returned 500");
    }

    #[test]
    fn test_error_display_malformed() {
        let err = Error::malformed("split", "not json");
        assert_eq!(
            err.to_string(),
            "Malformed oracle response from split stage: not json"
        );
    }

    #[test]
    fn test_malformed_snippet_is_truncated() {
        let long = "x".repeat(SNIPPET_MAX_CHARS * 3);
        match Error::malformed("classify", &long) {
            Error::MalformedResponse { snippet, .. } => {
                assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS + 3);
                assert!(snippet.ends_with("..."));
            }
            other => panic!("Expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_snippet_handles_multibyte() {
        let text = "ü".repeat(SNIPPET_MAX_CHARS + 1);
        let s = snippet(&text);
        assert!(s.starts_with('ü'));
        assert!(s.ends_with("..."));
    }

    #[test]
    fn test_snippet_short_text_unchanged() {
        assert_eq!(snippet("[1, 2"), "[1, 2");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().contains("Serialization error:"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_batch_recoverable_classification() {
        assert!(Error::Inference("timeout".into()).is_batch_recoverable());
        assert!(Error::malformed("canonicalize", "oops").is_batch_recoverable());
        assert!(Error::Serialization("bad".into()).is_batch_recoverable());
        assert!(!Error::Config("no prompts".into()).is_batch_recoverable());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
