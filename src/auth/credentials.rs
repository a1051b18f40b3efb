//! In-memory credential set.

/// Lead time before actual expiry at which a token is treated as stale.
pub const EXPIRY_MARGIN_SECS: i64 = 90;

/// Expiry applied when the token endpoint omits `ExpiresIn`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// The current session tokens, all absent until the first login.
///
/// `expires_at` is a Unix timestamp in seconds and is meaningless while
/// `access_token` is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialSet {
    /// Bearer credential for REST calls.
    pub access_token: Option<String>,
    /// Identity token; the vendor backend accepts it for writes and the
    /// push channel requires it in the handshake.
    pub identity_token: Option<String>,
    /// Refresh credential; outlives the other two.
    pub refresh_token: Option<String>,
    /// Absolute expiry of the access token (Unix seconds).
    pub expires_at: Option<i64>,
}

/// Parsed token envelope from a login or refresh exchange.
#[derive(Debug, Clone)]
pub(crate) struct TokenEnvelope {
    pub access_token: String,
    pub identity_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

impl CredentialSet {
    /// Check whether the access token can be used without a network call.
    ///
    /// `now` must be outside the safety margin of `expires_at`.
    pub fn is_fresh(&self, now: i64) -> bool {
        self.access_token.is_some()
            && matches!(self.expires_at, Some(expires_at) if now < expires_at - EXPIRY_MARGIN_SECS)
    }

    /// Replace the whole set from a full login exchange.
    pub(crate) fn replace(&mut self, envelope: TokenEnvelope, now: i64) {
        self.expires_at = Some(now + envelope.expires_in);
        self.access_token = Some(envelope.access_token);
        self.identity_token = envelope.identity_token;
        self.refresh_token = envelope.refresh_token;
    }

    /// Apply a refresh exchange.
    ///
    /// Refresh responses routinely omit the refresh token; the stored one
    /// stays valid and is retained.
    pub(crate) fn apply_refresh(&mut self, envelope: TokenEnvelope, now: i64) {
        self.expires_at = Some(now + envelope.expires_in);
        self.access_token = Some(envelope.access_token);
        self.identity_token = envelope.identity_token;
        if envelope.refresh_token.is_some() {
            self.refresh_token = envelope.refresh_token;
        }
    }
}
