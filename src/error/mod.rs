//! Error types for the bridge.
//!
//! Two layers: [`AuthError`] for credential exchanges (unrecoverable
//! without new credentials), and [`ApiError`] for authenticated REST
//! calls (transport, protocol, or auth failures surfaced to the caller).
//! Push-channel failures never become errors at this level; the
//! notifications loop logs and retries them internally.

mod api;
mod auth;

pub use api::ApiError;
pub use auth::AuthError;

/// Longest slice of a response body carried inside an error message.
///
/// Bounded so expired-credential material and vendor stack traces do not
/// leak wholesale into logs.
pub(crate) const MAX_ERROR_BODY_LEN: usize = 512;

/// Truncate a response body for inclusion in an error or log line.
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}
