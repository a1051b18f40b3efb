//! fresco-bridge - hub-side client for Instant Brands appliances on the
//! Fresco KitchenOS cloud.
//!
//! Three pieces cooperate here: a [`auth::TokenManager`] that keeps a
//! Cognito session alive across login/refresh/expiry, a
//! [`api::KitchenOsClient`] that submits cooking commands with token
//! fallback, and a [`notifications::NotificationsManager`] that mirrors
//! live device state from the vendor's push channel.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod notifications;

pub use api::KitchenOsClient;
pub use auth::TokenManager;
pub use config::BridgeConfig;
pub use error::{ApiError, AuthError};
pub use notifications::NotificationsManager;
