//! Client error types.

/// Errors that can occur when using the squish client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// A usage window or rate limit is exhausted.
    #[error("quota exceeded: {reason}")]
    QuotaExceeded {
        /// The denial reason, e.g. "monthly limit reached".
        reason: String,
        /// The tier that would lift the limit, when the server names one.
        upgrade_required: Option<String>,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
