//! HTTP client for the KitchenOS REST API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::TokenManager;
use crate::config::BridgeConfig;
use crate::error::{truncate_body, ApiError};

use super::attempt::{classify_status, reason_phrase, Attempt, AttemptClass};
use super::commands::{CapabilityDocument, CommandKind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// The GET endpoints want the versioned media type; `/cooking/execute`
/// rejects it on some stacks, so POSTs send plain JSON.
const ACCEPT_VERSIONED: &str = "application/x.default+json;version=2";

const EXECUTE_PATH: &str = "/cooking/execute";
const USER_PATH: &str = "/user/";
const SESSIONS_PATH: &str = "/cooking/sessions/";

/// Client for one appliance on the KitchenOS cloud.
///
/// Writes go through [`Self::execute`] with the identity-then-access token
/// ladder; auth-class rejections of both tokens force one full re-login
/// before the final retry pair.
pub struct KitchenOsClient {
    http: Client,
    base_url: String,
    device_id: String,
    module_idx: u32,
    tokens: Arc<TokenManager>,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    appliance_module_idx: u32,
    device_id: &'a str,
    command: CommandKind,
    composite_capabilities: &'a [CapabilityDocument],
    #[serde(skip_serializing_if = "Option::is_none")]
    capability: Option<&'a CapabilityDocument>,
}

/// Result of a successful `/cooking/execute` call.
///
/// The cloud is loose about success bodies: often 202 with nothing, at
/// times JSON, occasionally opaque text. All three are successes.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteResponse {
    /// A JSON body.
    Json(Value),
    /// An empty body; only the status is meaningful.
    Status(u16),
    /// A non-JSON body, surfaced as-is.
    Text { status: u16, body: String },
}

/// The user profile returned by `/user/`, used for device discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub devices: Vec<ProfileDevice>,
}

/// One appliance registered to the account.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileDevice {
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub appliance_module_idx: Option<u32>,
}

impl KitchenOsClient {
    /// Create a client for the configured appliance.
    pub fn new(config: &BridgeConfig, tokens: Arc<TokenManager>) -> Self {
        Self {
            http: Client::new(),
            base_url: config.api_base.clone(),
            device_id: config.device_id.clone(),
            module_idx: config.module_idx,
            tokens,
        }
    }

    /// Submit one cooking command.
    pub async fn execute(
        &self,
        command: CommandKind,
        capability: Option<&CapabilityDocument>,
    ) -> Result<ExecuteResponse, ApiError> {
        self.execute_with_composites(command, capability, &[]).await
    }

    /// Submit one cooking command with composite capabilities.
    ///
    /// Token ladder: identity token (when obtainable) first - the backend
    /// accepts it for writes and preferring it avoids spurious 401s - then
    /// access token; if both are rejected, one forced re-login and one
    /// final retry pair. A non-auth failure raises immediately at any
    /// rung.
    pub async fn execute_with_composites(
        &self,
        command: CommandKind,
        capability: Option<&CapabilityDocument>,
        composite_capabilities: &[CapabilityDocument],
    ) -> Result<ExecuteResponse, ApiError> {
        let request = ExecuteRequest {
            appliance_module_idx: self.module_idx,
            device_id: &self.device_id,
            command,
            composite_capabilities,
            capability,
        };

        let mut relogin_done = false;
        loop {
            if let Some(identity) = self.tokens.get_identity_token().await? {
                match self.post_execute(&request, &identity).await? {
                    Attempt::Success { status, body } => {
                        return Ok(parse_success_body(status, &body));
                    }
                    Attempt::AuthRejected { status, .. } => {
                        debug!(status, "identity token rejected, trying access token");
                    }
                    Attempt::Failed {
                        status,
                        reason,
                        body,
                    } => {
                        return Err(ApiError::UnexpectedStatus {
                            endpoint: EXECUTE_PATH.to_string(),
                            status,
                            reason,
                            body,
                        });
                    }
                }
            }

            let access = self.tokens.get_access_token().await?;
            match self.post_execute(&request, &access).await? {
                Attempt::Success { status, body } => {
                    return Ok(parse_success_body(status, &body));
                }
                Attempt::AuthRejected {
                    status,
                    reason,
                    body,
                } => {
                    if relogin_done {
                        return Err(ApiError::UnexpectedStatus {
                            endpoint: EXECUTE_PATH.to_string(),
                            status,
                            reason,
                            body,
                        });
                    }
                    info!(status, "credentials rejected, forcing re-authentication");
                    self.tokens.login().await?;
                    relogin_done = true;
                }
                Attempt::Failed {
                    status,
                    reason,
                    body,
                } => {
                    return Err(ApiError::UnexpectedStatus {
                        endpoint: EXECUTE_PATH.to_string(),
                        status,
                        reason,
                        body,
                    });
                }
            }
        }
    }

    /// Fetch the account profile (device discovery).
    ///
    /// Simpler retry than `execute`: access token, one retry with the
    /// identity token on an auth-class rejection, remaining failures
    /// final.
    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        let access = self.tokens.get_access_token().await?;
        let mut attempt = self.send_get(USER_PATH, &access).await?;

        if matches!(attempt, Attempt::AuthRejected { .. }) {
            debug!("access token rejected on profile fetch, retrying with identity token");
            if let Some(identity) = self.tokens.get_identity_token().await? {
                attempt = self.send_get(USER_PATH, &identity).await?;
            }
        }

        match attempt {
            Attempt::Success { body, .. } => {
                serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse {
                    endpoint: USER_PATH.to_string(),
                    message: format!("{}: {}", e, truncate_body(&body)),
                })
            }
            Attempt::AuthRejected {
                status,
                reason,
                body,
            }
            | Attempt::Failed {
                status,
                reason,
                body,
            } => Err(ApiError::UnexpectedStatus {
                endpoint: USER_PATH.to_string(),
                status,
                reason,
                body,
            }),
        }
    }

    /// Fetch the capability schema for an appliance model.
    pub async fn appliance_capabilities(&self, model_id: &str) -> Result<Value, ApiError> {
        let path = format!("/appliances/{}", model_id);
        self.get_json(&path).await
    }

    /// List the account's cooking sessions.
    pub async fn list_sessions(&self) -> Result<Value, ApiError> {
        self.get_json(SESSIONS_PATH).await
    }

    /// Plain authenticated GET; a success body that is not JSON degrades
    /// to an empty object rather than failing the call.
    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let access = self.tokens.get_access_token().await?;
        match self.send_get(path, &access).await? {
            Attempt::Success { body, .. } => {
                Ok(serde_json::from_str(&body).unwrap_or_else(|_| Value::Object(Default::default())))
            }
            Attempt::AuthRejected {
                status,
                reason,
                body,
            }
            | Attempt::Failed {
                status,
                reason,
                body,
            } => Err(ApiError::UnexpectedStatus {
                endpoint: path.to_string(),
                status,
                reason,
                body,
            }),
        }
    }

    async fn post_execute(
        &self,
        request: &ExecuteRequest<'_>,
        token: &str,
    ) -> Result<Attempt, ApiError> {
        let url = format!("{}{}", self.base_url, EXECUTE_PATH);
        debug!(%url, command = %request.command, "POST");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                endpoint: EXECUTE_PATH.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ApiError::Transport {
            endpoint: EXECUTE_PATH.to_string(),
            message: e.to_string(),
        })?;
        debug!(status, body = %truncate_body(&text), "POST response");

        Ok(attempt_from(status, text))
    }

    async fn send_get(&self, path: &str, token: &str) -> Result<Attempt, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header(ACCEPT, ACCEPT_VERSIONED)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                endpoint: path.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ApiError::Transport {
            endpoint: path.to_string(),
            message: e.to_string(),
        })?;
        debug!(status, body = %truncate_body(&text), "GET response");

        Ok(attempt_from(status, text))
    }
}

fn attempt_from(status: u16, body: String) -> Attempt {
    match classify_status(status) {
        AttemptClass::Success => Attempt::Success { status, body },
        AttemptClass::AuthRejected => Attempt::AuthRejected {
            status,
            reason: reason_phrase(status),
            body: truncate_body(&body),
        },
        AttemptClass::Failed => Attempt::Failed {
            status,
            reason: reason_phrase(status),
            body: truncate_body(&body),
        },
    }
}

fn parse_success_body(status: u16, text: &str) -> ExecuteResponse {
    if text.is_empty() {
        return ExecuteResponse::Status(status);
    }
    match serde_json::from_str(text) {
        Ok(value) => ExecuteResponse::Json(value),
        Err(_) => ExecuteResponse::Text {
            status,
            body: truncate_body(text),
        },
    }
}
