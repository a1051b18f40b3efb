//! Credential lifecycle for the KitchenOS cloud.
//!
//! The vendor authenticates through a Cognito user pool; a session is an
//! access/identity/refresh token triple with an absolute expiry. Tokens
//! live only in memory - each process re-derives its session on startup.

pub mod credentials;
pub mod token_manager;

pub use credentials::CredentialSet;
pub use token_manager::TokenManager;
