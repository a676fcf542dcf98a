//! Error types for the property advisor

use thiserror::Error;

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Turn Pipeline Errors
    // =============================

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Malformed provider response: {0}")]
    ProviderResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OrchestrationError {
    /// Whether the failure came from the remote provider side. Reported to
    /// HTTP callers as 503.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            OrchestrationError::ProviderUnavailable(_)
                | OrchestrationError::ProviderResponse(_)
                | OrchestrationError::HttpError(_)
                | OrchestrationError::SerializationError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_failure_classification() {
        assert!(OrchestrationError::ProviderUnavailable("down".into()).is_provider_failure());
        assert!(OrchestrationError::ProviderResponse("bad json".into()).is_provider_failure());
        assert!(!OrchestrationError::InvalidRequest("empty".into()).is_provider_failure());
        assert!(!OrchestrationError::Config("PORT".into()).is_provider_failure());
    }

    #[test]
    fn test_display_messages() {
        let err = OrchestrationError::InvalidRequest("unknown scenario 'x'".into());
        assert_eq!(err.to_string(), "Invalid request: unknown scenario 'x'");
    }
}
