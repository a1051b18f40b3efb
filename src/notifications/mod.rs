//! Realtime device state from the KitchenOS push channel.
//!
//! One long-lived WebSocket connection per [`NotificationsManager`];
//! inbound events replace per-device snapshots wholesale and fan out to
//! registered listeners. The connection reconnects forever with
//! exponential backoff; only [`NotificationsManager::stop`] ends it.

mod backoff;
pub mod manager;
pub mod messages;

pub use manager::{NotificationsManager, RemoveListener};
pub use messages::{CapabilityState, DeviceSnapshot};
