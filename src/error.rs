use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors surfaced by the subscription client, validator and manager.
#[derive(Error, Debug)]
pub enum Error {
    /// Network or DNS failure talking to the provider. Retryable.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Provider rejected the credentials (401/403). Not retryable.
    #[error("authentication rejected by provider (status {0})")]
    Auth(u16),

    /// Provider reports a subscription already exists for these credentials.
    /// Recoverable: fall back to listing and adopt the existing one.
    #[error("subscription already exists for these credentials")]
    Conflict,

    /// Unexpected non-2xx from the provider.
    #[error("provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    /// Provider response body did not match the expected shape.
    #[error("failed to decode provider response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Inbound verification request is missing a required parameter.
    #[error("malformed challenge request: {0}")]
    MalformedRequest(&'static str),

    /// Inbound verify token does not match the pending one, or the pending
    /// token was already consumed.
    #[error("verify token mismatch")]
    TokenMismatch,

    /// No verification arrived within the configured window.
    #[error("verification window elapsed before the provider called back")]
    Timeout,

    /// Caller cancelled while the handshake was pending.
    #[error("cancelled while awaiting verification")]
    Cancelled,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Error::TokenMismatch => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
