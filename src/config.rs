//! Integration configuration.
//!
//! Everything the bridge needs to talk to the KitchenOS cloud: the user's
//! account credentials, the Cognito app client, and the identity of the
//! appliance being controlled. Endpoint fields default to the production
//! cloud and exist mainly so tests can point at a local server.

use serde::Deserialize;

/// Production REST API base.
pub const DEFAULT_API_BASE: &str = "https://api.fresco-kitchenos.com";

/// Cognito region the vendor app is provisioned in.
pub const DEFAULT_REGION: &str = "us-east-2";

/// Appliance model used when the hub config does not name one.
pub const DEFAULT_MODEL_ID: &str = "kitchenos:InstantBrands:InstantPotProPlus";

/// Push notification channel.
pub const DEFAULT_NOTIFICATIONS_URL: &str = "wss://notifications.fresco-kitchenos.com/ws";

/// Configuration for one bridged appliance.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Vendor account username (email).
    pub username: String,
    /// Vendor account password.
    pub password: String,
    /// Cognito app client id, e.g. `5qucjsjb9i1ahnddonctmp9hba`.
    pub client_id: String,
    /// Cognito region, e.g. `us-east-2`.
    #[serde(default = "default_region")]
    pub region: String,
    /// Target device identifier, discovered via the user profile.
    pub device_id: String,
    /// Appliance module index, usually 0.
    #[serde(default)]
    pub module_idx: u32,
    /// Appliance model id.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Token endpoint override; when unset it is derived from `region`.
    #[serde(default)]
    pub auth_endpoint: Option<String>,
    /// Push channel URL.
    #[serde(default = "default_notifications_url")]
    pub notifications_url: String,
}

impl BridgeConfig {
    /// The identity provider's token endpoint for this configuration.
    pub fn token_endpoint(&self) -> String {
        self.auth_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.region))
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_notifications_url() -> String {
    DEFAULT_NOTIFICATIONS_URL.to_string()
}
