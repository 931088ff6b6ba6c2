//! Error types for Designator

use thiserror::Error;

/// Result type alias for Designator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in Designator
#[derive(Debug, Error)]
pub enum Error {
    /// No page agent is alive in the targeted tab and one could not be injected
    #[error("Page agent unreachable: {0}")]
    AgentUnreachable(String),

    /// The browser bridge is not connected
    #[error("Browser bridge unavailable: {0}")]
    BridgeUnavailable(String),

    /// A request to another context did not answer in time
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// Caller handed us something unusable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// System clipboard write failed after all fallbacks
    #[error("Clipboard error: {0}")]
    ClipboardError(String),

    /// Configuration load, validation, or persistence error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an error with additional context
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ConfigError("attribute name must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: attribute name must not be empty"
        );
    }

    #[test]
    fn test_error_with_context() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::with_context("Failed to load config", io_err);

        assert!(err.to_string().contains("Failed to load config"));
        assert!(err.to_string().contains("file not found"));
    }
}
