//! Token manager: login, refresh, and serialized access to the session.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::error::{truncate_body, AuthError};

use super::credentials::{CredentialSet, TokenEnvelope, DEFAULT_EXPIRES_IN_SECS};

const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(20);

/// Owns the session's [`CredentialSet`] and keeps it usable.
///
/// All entry points serialize on one async mutex, so a burst of callers
/// hitting a stale token produces exactly one network exchange: the first
/// caller performs it, the rest observe its result.
pub struct TokenManager {
    http: Client,
    token_url: String,
    client_id: String,
    username: String,
    password: String,
    creds: Mutex<CredentialSet>,
}

/// Cognito InitiateAuth response envelope.
#[derive(Debug, Deserialize)]
struct InitiateAuthResponse {
    #[serde(rename = "AuthenticationResult")]
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
struct AuthenticationResult {
    #[serde(rename = "AccessToken")]
    access_token: Option<String>,
    #[serde(rename = "IdToken")]
    identity_token: Option<String>,
    #[serde(rename = "RefreshToken")]
    refresh_token: Option<String>,
    #[serde(rename = "ExpiresIn")]
    expires_in: Option<i64>,
}

impl TokenManager {
    /// Create a manager for the given configuration.
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            http: Client::new(),
            token_url: config.token_endpoint(),
            client_id: config.client_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            creds: Mutex::new(CredentialSet::default()),
        }
    }

    /// Return a currently-valid access token, logging in or refreshing
    /// first if the cached one is stale or absent.
    pub async fn get_access_token(&self) -> Result<String, AuthError> {
        let mut creds = self.creds.lock().await;
        self.ensure_fresh(&mut creds).await?;
        creds.access_token.clone().ok_or(AuthError::NotAuthenticated)
    }

    /// Return a currently-valid identity token, if the vendor flow issued
    /// one. Same freshness contract as [`Self::get_access_token`].
    pub async fn get_identity_token(&self) -> Result<Option<String>, AuthError> {
        let mut creds = self.creds.lock().await;
        self.ensure_fresh(&mut creds).await?;
        Ok(creds.identity_token.clone())
    }

    /// Unconditionally perform a full password login, replacing the
    /// credential set.
    ///
    /// Callers that need a forced fresh exchange (onboarding, re-auth
    /// after a 401) use this instead of the freshness-checked getters.
    pub async fn login(&self) -> Result<(), AuthError> {
        let mut creds = self.creds.lock().await;
        self.password_login(&mut creds).await
    }

    /// Freshness check, shared by both getters.
    ///
    /// Fresh token: no network call. Stale with a refresh token: try the
    /// refresh exchange, falling through to a full login on failure. No
    /// refresh token: full login. Only the final login failure
    /// propagates.
    async fn ensure_fresh(&self, creds: &mut CredentialSet) -> Result<(), AuthError> {
        let now = Utc::now().timestamp();
        if creds.is_fresh(now) {
            return Ok(());
        }

        if let Some(refresh_token) = creds.refresh_token.clone() {
            match self.refresh_exchange(&refresh_token).await {
                Ok(envelope) => {
                    debug!("access token refreshed");
                    creds.apply_refresh(envelope, Utc::now().timestamp());
                    return Ok(());
                }
                Err(e) => {
                    warn!(code = e.error_code(), error = %e, "token refresh failed; falling back to full login");
                }
            }
        }

        self.password_login(creds).await
    }

    async fn password_login(&self, creds: &mut CredentialSet) -> Result<(), AuthError> {
        debug!("performing full login exchange");
        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "USERNAME": self.username,
                "PASSWORD": self.password,
            },
        });
        let envelope = self.initiate_auth(&body).await?;
        creds.replace(envelope, Utc::now().timestamp());
        Ok(())
    }

    async fn refresh_exchange(&self, refresh_token: &str) -> Result<TokenEnvelope, AuthError> {
        debug!("performing refresh exchange");
        let body = json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "REFRESH_TOKEN": refresh_token,
            },
        });
        self.initiate_auth(&body).await
    }

    /// One InitiateAuth round-trip. Any non-success status or malformed
    /// envelope is an [`AuthError`]; there is no retry at this layer.
    async fn initiate_auth(&self, body: &serde_json::Value) -> Result<TokenEnvelope, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .header(CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .header("X-Amz-Target", INITIATE_AUTH_TARGET)
            .json(body)
            .timeout(EXCHANGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| AuthError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AuthError::Transport {
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(AuthError::ExchangeRejected {
                status: status.as_u16(),
                body: truncate_body(&text),
            });
        }

        parse_token_envelope(&text)
    }
}

/// Extract the token triple and expiry from an exchange response body.
fn parse_token_envelope(text: &str) -> Result<TokenEnvelope, AuthError> {
    let parsed: InitiateAuthResponse =
        serde_json::from_str(text).map_err(|e| AuthError::InvalidResponse {
            message: format!("malformed token response ({}): {}", e, truncate_body(text)),
        })?;

    let result = parsed
        .authentication_result
        .ok_or_else(|| AuthError::InvalidResponse {
            message: format!(
                "missing AuthenticationResult: {}",
                truncate_body(text)
            ),
        })?;

    let access_token = result.access_token.ok_or_else(|| AuthError::InvalidResponse {
        message: format!("missing AccessToken: {}", truncate_body(text)),
    })?;

    Ok(TokenEnvelope {
        access_token,
        identity_token: result.identity_token,
        refresh_token: result.refresh_token,
        expires_in: result.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_envelope_full() {
        let body = r#"{
            "AuthenticationResult": {
                "AccessToken": "access-1",
                "IdToken": "id-1",
                "RefreshToken": "refresh-1",
                "ExpiresIn": 1800,
                "TokenType": "Bearer"
            },
            "ChallengeParameters": {}
        }"#;

        let envelope = parse_token_envelope(body).unwrap();
        assert_eq!(envelope.access_token, "access-1");
        assert_eq!(envelope.identity_token.as_deref(), Some("id-1"));
        assert_eq!(envelope.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(envelope.expires_in, 1800);
    }

    #[test]
    fn test_parse_token_envelope_defaults_expiry() {
        let body = r#"{
            "AuthenticationResult": {
                "AccessToken": "access-1"
            }
        }"#;

        let envelope = parse_token_envelope(body).unwrap();
        assert_eq!(envelope.expires_in, DEFAULT_EXPIRES_IN_SECS);
        assert!(envelope.identity_token.is_none());
        assert!(envelope.refresh_token.is_none());
    }

    #[test]
    fn test_parse_token_envelope_missing_access_token() {
        let body = r#"{"AuthenticationResult": {"IdToken": "id-1"}}"#;
        let err = parse_token_envelope(body).unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse { .. }));
        assert!(format!("{}", err).contains("missing AccessToken"));
    }

    #[test]
    fn test_parse_token_envelope_missing_result() {
        let body = r#"{"ChallengeName": "SMS_MFA"}"#;
        let err = parse_token_envelope(body).unwrap_err();
        assert!(format!("{}", err).contains("AuthenticationResult"));
    }

    #[test]
    fn test_parse_token_envelope_non_json() {
        let err = parse_token_envelope("<html>gateway timeout</html>").unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse { .. }));
        assert!(format!("{}", err).contains("gateway timeout"));
    }

    #[test]
    fn test_parse_token_envelope_truncates_diagnostics() {
        let body = format!("{{\"oops\": \"{}\"}}", "z".repeat(4096));
        let err = parse_token_envelope(&body).unwrap_err();
        // The embedded body sample stays bounded.
        assert!(format!("{}", err).len() < 1024);
    }
}
