//! Push-channel frame model.

use serde::{Deserialize, Serialize};

/// One inbound frame from the push channel.
///
/// State frames carry `device_id` plus nested state; the backend also
/// emits occasional advisory frames (notably a spurious `"Forbidden"`)
/// distinguished by the `message` field. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PushEvent {
    /// Advisory sentinel; present only on non-state frames.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_state: Option<String>,
    #[serde(default)]
    pub capability: Option<CapabilityState>,
}

/// The active capability reported by the appliance.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CapabilityState {
    #[serde(default)]
    pub id: Option<String>,
    /// Friendly name, e.g. `PressureCook`.
    #[serde(default)]
    pub name: Option<String>,
    /// Display text, e.g. `Cooking`.
    #[serde(default)]
    pub text: Option<String>,
    /// Progress in percent, when the capability reports one.
    #[serde(default)]
    pub progress: Option<f64>,
    /// Capability-type tag, e.g. `kitchenos:CapabilityType:Cooking`.
    #[serde(default, rename = "type")]
    pub capability_type: Option<String>,
}

/// Last-known state for one device, replaced wholesale per event.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    /// Opaque status tag, e.g. `kitchenos:DeviceState:Running`.
    pub device_state: Option<String>,
    pub capability: Option<CapabilityState>,
}

impl PushEvent {
    pub(crate) fn into_snapshot(self) -> DeviceSnapshot {
        DeviceSnapshot {
            device_state: self.device_state,
            capability: self.capability,
        }
    }
}
