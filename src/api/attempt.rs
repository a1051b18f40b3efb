//! Per-attempt outcome classification for authenticated calls.
//!
//! The token fallback in [`super::client`] is driven by this tagged
//! outcome rather than by catching errors, so the ladder's ordering is
//! plain, testable logic.

/// Statuses the command endpoint uses for success; the cloud frequently
/// answers 202 with an empty body.
pub(crate) const SUCCESS_STATUSES: [u16; 4] = [200, 201, 202, 204];

/// How one authenticated attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Attempt {
    /// 2xx from the accepted set; body kept raw for the caller to parse.
    Success { status: u16, body: String },
    /// The credential was rejected (401/403); the next token kind may
    /// still succeed.
    AuthRejected {
        status: u16,
        reason: String,
        body: String,
    },
    /// Any other non-success status; not an auth problem, surfaced
    /// immediately.
    Failed {
        status: u16,
        reason: String,
        body: String,
    },
}

/// Status-code class for the fallback decision table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum AttemptClass {
    Success,
    AuthRejected,
    Failed,
}

pub(crate) fn classify_status(status: u16) -> AttemptClass {
    if SUCCESS_STATUSES.contains(&status) {
        AttemptClass::Success
    } else if status == 401 || status == 403 {
        AttemptClass::AuthRejected
    } else {
        AttemptClass::Failed
    }
}

/// Canonical reason phrase for a status code, for error text.
pub(crate) fn reason_phrase(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
        .to_string()
}
