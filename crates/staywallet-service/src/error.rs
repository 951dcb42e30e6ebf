//! Error types for collaborator clients.

use staywallet_core::WalletError;

/// Errors that can occur when calling an external collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The collaborator returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or error message.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The collaborator answered, but not with something usable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CollaboratorError {
    /// Convert into the ledger's error type, naming the failing service.
    #[must_use]
    pub fn into_wallet_error(self, service: &str) -> WalletError {
        WalletError::external(service, self)
    }
}
