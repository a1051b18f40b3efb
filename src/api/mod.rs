//! Authenticated REST surface of the KitchenOS cloud.
//!
//! [`KitchenOsClient`] issues cooking commands and reads; the
//! [`commands`] module builds the vendor's capability/setting documents
//! from typed user intents.

mod attempt;
pub mod client;
pub mod commands;

pub use client::{ExecuteResponse, KitchenOsClient, ProfileDevice, UserProfile};
pub use commands::{
    CapabilityDocument, CapabilitySetting, CommandError, CommandKind, KeepWarmTarget,
    PressureCookSettings, PressureCookUpdate, PressureLevel, SettingValue, VentingMode,
};
