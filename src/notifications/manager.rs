//! The push-channel connection loop and subscriber registry.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::auth::TokenManager;
use crate::config::BridgeConfig;
use crate::error::AuthError;

use super::backoff::Backoff;
use super::messages::{DeviceSnapshot, PushEvent};

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Subscriber callback, invoked with the latest snapshot.
pub type ListenerFn = dyn Fn(&DeviceSnapshot) + Send + Sync;

/// Removes exactly the registration that produced it.
pub type RemoveListener = Box<dyn FnOnce() + Send>;

/// Connection-level failure inside the loop; never escapes it.
#[derive(Debug)]
enum NotificationsError {
    Auth(AuthError),
    NoIdentityToken,
    Connect(String),
    Transport(String),
}

impl std::fmt::Display for NotificationsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationsError::Auth(e) => write!(f, "authentication failed: {}", e),
            NotificationsError::NoIdentityToken => {
                write!(f, "no identity token available for handshake")
            }
            NotificationsError::Connect(msg) => write!(f, "connect failed: {}", msg),
            NotificationsError::Transport(msg) => write!(f, "connection error: {}", msg),
        }
    }
}

struct Listener {
    id: u64,
    callback: Arc<ListenerFn>,
}

#[derive(Default)]
struct SyncState {
    /// Last-known state per device, replaced wholesale per event.
    snapshots: HashMap<String, DeviceSnapshot>,
    /// Availability per device the channel has ever reported on.
    available: HashMap<String, bool>,
    listeners: HashMap<String, Vec<Listener>>,
    next_listener_id: u64,
}

impl SyncState {
    fn listeners_for(&self, device_id: &str) -> Vec<Arc<ListenerFn>> {
        self.listeners
            .get(device_id)
            .map(|listeners| listeners.iter().map(|l| Arc::clone(&l.callback)).collect())
            .unwrap_or_default()
    }
}

struct Inner {
    tokens: Arc<TokenManager>,
    ws_url: String,
    shutdown: AtomicBool,
    running: AtomicBool,
    state: StdMutex<SyncState>,
}

/// Owns the single push connection and the authoritative device state.
///
/// `start` spawns the connection loop; `stop` cancels it and waits for it
/// to finish, after which no further dispatches occur. Everything else is
/// readable from any task.
pub struct NotificationsManager {
    inner: Arc<Inner>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl NotificationsManager {
    pub fn new(config: &BridgeConfig, tokens: Arc<TokenManager>) -> Self {
        Self {
            inner: Arc::new(Inner {
                tokens,
                ws_url: config.notifications_url.clone(),
                shutdown: AtomicBool::new(false),
                running: AtomicBool::new(false),
                state: StdMutex::new(SyncState::default()),
            }),
            task: StdMutex::new(None),
        }
    }

    /// Start the background connection loop. A second call while the loop
    /// is alive is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap();
        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                debug!("notifications task already running");
                return;
            }
        }
        self.inner.shutdown.store(false, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            run_loop(inner).await;
        }));
    }

    /// Cancel the connection loop and wait for it to terminate.
    pub async fn stop(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.abort();
            // The JoinError from cancellation is expected.
            let _ = handle.await;
        }
        self.inner.running.store(false, Ordering::SeqCst);
        debug!("notifications task stopped");
    }

    /// Last-known snapshot for a device, if any event has been seen.
    pub fn get_state(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.inner.state.lock().unwrap().snapshots.get(device_id).cloned()
    }

    /// Availability of a device.
    ///
    /// Devices the channel has reported on keep their stored flag. A
    /// never-observed device is optimistically available while the loop
    /// is running - absence of data is not known-bad state.
    pub fn is_available(&self, device_id: &str) -> bool {
        let state = self.inner.state.lock().unwrap();
        match state.available.get(device_id) {
            Some(flag) => *flag,
            None => self.inner.running.load(Ordering::SeqCst),
        }
    }

    /// Register a listener for a device.
    ///
    /// If a snapshot already exists it is delivered synchronously before
    /// this returns. The returned closure removes exactly this
    /// registration; other listeners on the same device are unaffected.
    pub fn add_listener<F>(&self, device_id: &str, callback: F) -> RemoveListener
    where
        F: Fn(&DeviceSnapshot) + Send + Sync + 'static,
    {
        let callback: Arc<ListenerFn> = Arc::new(callback);
        let (listener_id, snapshot) = {
            let mut state = self.inner.state.lock().unwrap();
            let listener_id = state.next_listener_id;
            state.next_listener_id += 1;
            state
                .listeners
                .entry(device_id.to_string())
                .or_default()
                .push(Listener {
                    id: listener_id,
                    callback: Arc::clone(&callback),
                });
            (listener_id, state.snapshots.get(device_id).cloned())
        };

        if let Some(snapshot) = snapshot {
            dispatch(std::slice::from_ref(&callback), &snapshot);
        }

        let inner = Arc::downgrade(&self.inner);
        let device_id = device_id.to_string();
        Box::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut state = inner.state.lock().unwrap();
                if let Some(listeners) = state.listeners.get_mut(&device_id) {
                    listeners.retain(|l| l.id != listener_id);
                    if listeners.is_empty() {
                        state.listeners.remove(&device_id);
                    }
                }
            }
        })
    }
}

impl Inner {
    /// Process one text frame from the channel.
    fn handle_frame(&self, text: &str) {
        let event: PushEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropping malformed notification frame");
                return;
            }
        };

        if let Some(message) = &event.message {
            // Backend quirk: a "Forbidden" advisory arrives on otherwise
            // healthy connections. Not a protocol-level close.
            debug!(%message, "ignoring advisory frame");
            return;
        }

        let Some(device_id) = event.device_id.clone() else {
            debug!("dropping frame without device id");
            return;
        };

        let snapshot = event.into_snapshot();
        let listeners = {
            let mut state = self.state.lock().unwrap();
            state.snapshots.insert(device_id.clone(), snapshot.clone());
            state.available.insert(device_id.clone(), true);
            state.listeners_for(&device_id)
        };
        dispatch(&listeners, &snapshot);
    }

    /// Restore availability for every previously seen device. No
    /// dispatch; the next inbound event or an `is_available` read picks
    /// it up.
    fn mark_all_available(&self) {
        let mut state = self.state.lock().unwrap();
        let device_ids: Vec<String> = state.snapshots.keys().cloned().collect();
        for device_id in device_ids {
            state.available.insert(device_id, true);
        }
    }

    /// Mark every known device unavailable and notify its subscribers.
    /// The one case where availability changes without an inbound event;
    /// devices already unavailable are not re-notified.
    fn mark_all_unavailable(&self) {
        let pending: Vec<(Vec<Arc<ListenerFn>>, DeviceSnapshot)> = {
            let mut state = self.state.lock().unwrap();
            let entries: Vec<(String, DeviceSnapshot)> = state
                .snapshots
                .iter()
                .map(|(id, snapshot)| (id.clone(), snapshot.clone()))
                .collect();
            let mut pending = Vec::new();
            for (device_id, snapshot) in entries {
                if state.available.insert(device_id.clone(), false) == Some(false) {
                    continue;
                }
                pending.push((state.listeners_for(&device_id), snapshot));
            }
            pending
        };

        for (listeners, snapshot) in pending {
            dispatch(&listeners, &snapshot);
        }
    }
}

/// Invoke each listener with the snapshot, isolating panics so one broken
/// subscriber never starves the others or kills the connection loop.
fn dispatch(listeners: &[Arc<ListenerFn>], snapshot: &DeviceSnapshot) {
    for callback in listeners {
        if std::panic::catch_unwind(AssertUnwindSafe(|| (**callback)(snapshot))).is_err() {
            warn!("state listener panicked, skipping");
        }
    }
}

/// Connection loop: connect, pump frames, and on any exit mark devices
/// unavailable and retry after backoff. Ends only on cancellation.
async fn run_loop(inner: Arc<Inner>) {
    inner.running.store(true, Ordering::SeqCst);
    let mut backoff = Backoff::new();

    while !inner.shutdown.load(Ordering::SeqCst) {
        match connect_and_run(&inner, &mut backoff).await {
            Ok(()) => info!("notifications connection closed"),
            Err(e) => warn!(error = %e, "notifications connection failed"),
        }

        inner.mark_all_unavailable();

        if inner.shutdown.load(Ordering::SeqCst) {
            break;
        }
        let delay = backoff.next_delay();
        debug!(delay_secs = delay.as_secs(), "reconnecting after backoff");
        tokio::time::sleep(delay).await;
    }

    inner.running.store(false, Ordering::SeqCst);
}

async fn connect_and_run(
    inner: &Arc<Inner>,
    backoff: &mut Backoff,
) -> Result<(), NotificationsError> {
    // The token rides in the handshake URL and cannot be swapped
    // mid-connection, so force a freshness check now.
    let identity = inner
        .tokens
        .get_identity_token()
        .await
        .map_err(NotificationsError::Auth)?
        .ok_or(NotificationsError::NoIdentityToken)?;

    let url = format!("{}?token={}", inner.ws_url, urlencoding::encode(&identity));
    debug!("connecting to notifications channel");
    let (stream, _) = connect_async(&url)
        .await
        .map_err(|e| NotificationsError::Connect(e.to_string()))?;
    info!("notifications channel connected");

    backoff.reset();
    inner.mark_all_available();

    let (mut sink, mut stream) = stream.split();
    let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
    keepalive.tick().await; // first tick completes immediately

    loop {
        if inner.shutdown.load(Ordering::SeqCst) {
            let _ = sink.close().await;
            return Ok(());
        }

        tokio::select! {
            _ = keepalive.tick() => {
                sink.send(Message::Ping(Vec::new()))
                    .await
                    .map_err(|e| NotificationsError::Transport(e.to_string()))?;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => inner.handle_frame(&text),
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) => {
                    info!("notifications channel closed by server");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(NotificationsError::Transport(e.to_string())),
                None => return Ok(()),
            }
        }
    }
}
