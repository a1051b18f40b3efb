//! Authentication-related error types.
//!
//! Failures of the login and refresh exchanges against the identity
//! provider. These are terminal for the exchange that produced them; the
//! token manager never retries them itself.

use std::fmt;

/// Credential exchange error variants.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// The identity provider rejected the exchange with a non-success
    /// status. Body is truncated.
    ExchangeRejected { status: u16, body: String },

    /// The exchange succeeded at the HTTP level but the response envelope
    /// was not the expected shape (non-JSON, or missing required tokens).
    InvalidResponse { message: String },

    /// The exchange could not be carried out at all (connect, TLS,
    /// timeout).
    Transport { message: String },

    /// No credential is available and none could be obtained.
    NotAuthenticated,
}

impl AuthError {
    /// Check if this error is plausibly transient.
    ///
    /// Transport failures may clear up on their own; a rejected exchange
    /// or a malformed envelope will not until credentials change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Transport { .. })
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::ExchangeRejected { .. } => "E_AUTH_REJECTED",
            AuthError::InvalidResponse { .. } => "E_AUTH_ENVELOPE",
            AuthError::Transport { .. } => "E_AUTH_TRANSPORT",
            AuthError::NotAuthenticated => "E_AUTH_NONE",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::ExchangeRejected { status, body } => {
                write!(f, "token exchange rejected ({}): {}", status, body)
            }
            AuthError::InvalidResponse { message } => {
                write!(f, "invalid token response: {}", message)
            }
            AuthError::Transport { message } => {
                write!(f, "token exchange failed: {}", message)
            }
            AuthError::NotAuthenticated => {
                write!(f, "not authenticated")
            }
        }
    }
}

impl std::error::Error for AuthError {}
