//! Error types for provider clients.

use thiserror::Error;

/// Result type for provider client operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur when talking to an AI provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The provider rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API key not found in the environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// The provider is throttling requests.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The response body did not match the expected wire format.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Any other non-success status from the API.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider cannot currently serve requests.
    #[error("provider not available: {0}")]
    NotAvailable(String),
}

impl ProviderError {
    /// Whether this error is a credentials problem.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_) | ProviderError::ApiKeyNotFound(_)
        )
    }

    /// Whether the provider asked us to back off.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimitExceeded(_))
    }

    /// Map a non-success HTTP status to the matching variant.
    pub(crate) fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            401 | 403 => ProviderError::AuthenticationFailed(message),
            429 => ProviderError::RateLimitExceeded(message),
            status => ProviderError::Api { status, message },
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::InvalidResponse(err.to_string())
    }
}

/// Provider failures surface to the engine as `WorkflowError::Provider`.
impl From<ProviderError> for cascade_core::WorkflowError {
    fn from(err: ProviderError) -> Self {
        cascade_core::WorkflowError::Provider(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let auth = ProviderError::from_status(reqwest::StatusCode::UNAUTHORIZED, "bad key".into());
        assert!(auth.is_auth_error());

        let throttled =
            ProviderError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(throttled.is_rate_limited());

        let other = ProviderError::from_status(reqwest::StatusCode::BAD_GATEWAY, "oops".into());
        assert!(matches!(other, ProviderError::Api { status: 502, .. }));
    }

    #[test]
    fn test_converts_into_workflow_error() {
        let err: cascade_core::WorkflowError =
            ProviderError::InvalidResponse("not json".into()).into();
        assert!(err.to_string().contains("invalid response: not json"));
    }
}
