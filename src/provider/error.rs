// ABOUTME: Provider error types with SNAFU pattern.
// ABOUTME: Classifies failures as transient (retryable) or permanent.

use snafu::Snafu;

/// Unified error for provider API calls.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    #[snafu(display("resource not found: {id}"))]
    NotFound { id: String },

    #[snafu(display("rate limited by provider: {message}"))]
    RateLimited { message: String },

    #[snafu(display("provider temporarily unavailable: {message}"))]
    Unavailable { message: String },

    #[snafu(display("request rejected by provider: {message}"))]
    Rejected { message: String },

    #[snafu(display("provider internal error: {message}"))]
    Internal { message: String },
}

/// Error kind for programmatic handling at the retry boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Worth retrying with backoff.
    Transient,
    /// Retrying will not help; surface to the operator.
    Permanent,
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::RateLimited { .. } | ProviderError::Unavailable { .. } => {
                ProviderErrorKind::Transient
            }
            ProviderError::NotFound { .. }
            | ProviderError::Rejected { .. }
            | ProviderError::Internal { .. } => ProviderErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ProviderErrorKind::Transient
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }
}
