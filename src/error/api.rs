//! REST call error type.

use thiserror::Error;

use super::AuthError;

/// Error surfaced by an authenticated REST call.
///
/// The `UnexpectedStatus` text keeps status, reason, and (truncated) body
/// intact so an operator can tell "bad input" from "expired session" from
/// "appliance offline".
#[derive(Debug, Error)]
pub enum ApiError {
    /// Obtaining or renewing credentials failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The request never produced an HTTP response (connect, TLS,
    /// timeout).
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// The endpoint answered with a status outside the accepted set.
    #[error("{endpoint} {status} {reason}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        reason: String,
        body: String,
    },

    /// A success response whose body did not parse as the expected shape.
    #[error("unexpected response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },
}

impl ApiError {
    /// The HTTP status this error carries, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
