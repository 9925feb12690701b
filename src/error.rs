use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures of the signer flow before a response was received.
///
/// A non-2xx response is not an error; it is reported through
/// [`DeliveryReport`](crate::client::DeliveryReport).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Nothing is listening at the target address.
    #[error("connection failed: {url}")]
    ConnectionFailed { url: String },

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to serialize payload: {0}")]
    Serialize(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout
        } else if err.is_connect() {
            DeliveryError::ConnectionFailed {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            DeliveryError::Transport(err.to_string())
        }
    }
}

/// Terminal outcomes of the verifier for a single request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// Received signature does not match `nonce ++ body`.
    #[error("invalid signature")]
    SignatureMismatch,

    /// Signature was valid but the body is not JSON.
    #[error("{0}")]
    ParseError(String),
}

impl WebhookError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::SignatureMismatch => StatusCode::UNAUTHORIZED,
            Self::ParseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::SignatureMismatch => (status, "Unauthorized").into_response(),
            // Test tool only: the parse error is echoed back verbatim.
            Self::ParseError(message) => (status, message).into_response(),
        }
    }
}

/// Result of checking a request against the shared secret.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("invalid signature")]
    InvalidSignature,
}

impl From<VerificationError> for WebhookError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::InvalidSignature => WebhookError::SignatureMismatch,
        }
    }
}

/// Problems reading the per-user configuration file.
///
/// None of these abort a run; the caller falls back to the placeholder secret.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not resolve home directory")]
    HomeDirectory,

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
