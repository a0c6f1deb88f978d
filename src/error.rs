//! Gateway error types

use std::time::Duration;

/// Gateway error types
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The mandatory first fetch failed, so no cache was produced.
    ///
    /// Wraps the refresh failure that caused it; see [`GatewayError::root()`].
    #[error("models cache initialization failed: {0}")]
    Initialization(#[source] Box<GatewayError>),

    // Refresh errors
    #[error("failed to get Copilot token: {0}")]
    Auth(String),

    #[error("models API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("invalid models JSON: {0}")]
    InvalidPayload(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("models refresh timed out after {0:?}")]
    Timeout(Duration),

    // Read/persistence errors
    #[error("models not available")]
    Unavailable,

    #[error("no models to save")]
    NoData,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// The underlying cause, looking through [`Initialization`](Self::Initialization).
    ///
    /// ```rust
    /// # use copilot_gateway::GatewayError;
    /// let err = GatewayError::Initialization(Box::new(GatewayError::Upstream {
    ///     status: 401,
    ///     body: "unauthorized".into(),
    /// }));
    /// assert!(matches!(err.root(), GatewayError::Upstream { status: 401, .. }));
    /// ```
    pub fn root(&self) -> &GatewayError {
        match self {
            GatewayError::Initialization(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Http(err.to_string())
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
