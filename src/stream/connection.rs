use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::transport::{RawEvent, Transport, TransportError};
use crate::kernel::event::ConnectionStatus;

pub type Handler = Box<dyn FnMut(&Value) + Send>;

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

struct Entry {
    event: String,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    closed: bool,
    handlers: HashMap<Uuid, Entry>,
    /// Handlers checked out by an in-progress dispatch.
    dispatching: HashSet<Uuid>,
    /// Checked-out handlers whose subscription was dropped meanwhile.
    cancelled: HashSet<Uuid>,
}

impl Registry {
    fn remove(&mut self, id: &Uuid) {
        if self.handlers.remove(id).is_none() && self.dispatching.contains(id) {
            self.cancelled.insert(*id);
        }
    }

    fn clear(&mut self) {
        self.closed = true;
        self.handlers.clear();
    }
}

/// Run every handler for `raw` with the registry unlocked, so a handler may
/// subscribe or drop a [`Subscription`] itself.
fn dispatch(registry: &Mutex<Registry>, raw: &RawEvent) -> usize {
    let mut taken: Vec<(Uuid, Entry)> = {
        let mut reg = lock(registry);
        if reg.closed {
            return 0;
        }
        let ids: Vec<Uuid> = reg
            .handlers
            .iter()
            .filter(|(_, e)| e.event == raw.event)
            .map(|(id, _)| *id)
            .collect();
        let taken: Vec<(Uuid, Entry)> = ids
            .into_iter()
            .filter_map(|id| reg.handlers.remove(&id).map(|entry| (id, entry)))
            .collect();
        reg.dispatching.extend(taken.iter().map(|(id, _)| *id));
        taken
    };

    for (_, entry) in taken.iter_mut() {
        (entry.handler)(&raw.data);
    }
    let delivered = taken.len();

    let mut reg = lock(registry);
    for (id, entry) in taken {
        reg.dispatching.remove(&id);
        // Unsubscribed mid-call, or the manager closed: do not put it back
        if reg.cancelled.remove(&id) || reg.closed {
            continue;
        }
        reg.handlers.insert(id, entry);
    }
    delivered
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // A panicking handler must not wedge teardown
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cancellation handle for one registered handler. Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    event: String,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(&self.id);
        }
    }
}

/// Owns one logical subscription to the push channel.
///
/// Handlers belong to the manager, not to the underlying transport
/// connection, so a transport-level reconnect keeps them attached. `close`
/// releases every handler; none runs after it returns.
pub struct ConnectionManager<T: Transport> {
    transport: Option<T>,
    registry: Arc<Mutex<Registry>>,
    policy: ReconnectPolicy,
    status: Arc<watch::Sender<ConnectionStatus>>,
    pump: Option<(CancellationToken, JoinHandle<T>)>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, policy: ReconnectPolicy) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            transport: Some(transport),
            registry: Arc::new(Mutex::new(Registry::default())),
            policy,
            status: Arc::new(status),
            pump: None,
        }
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.pump.is_some()
    }

    pub fn handler_count(&self) -> usize {
        lock(&self.registry).handlers.len()
    }

    pub fn subscribe<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: FnMut(&Value) + Send + 'static,
    {
        let id = Uuid::new_v4();
        lock(&self.registry).handlers.insert(
            id,
            Entry {
                event: event.to_string(),
                handler: Box::new(handler),
            },
        );
        debug!(%id, event, "handler registered");
        Subscription {
            id,
            event: event.to_string(),
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Connect (with the retry policy) and start delivering events.
    pub async fn open(&mut self) -> Result<(), TransportError> {
        if self.pump.is_some() {
            return Ok(());
        }
        let mut transport = self.transport.take().ok_or(TransportError::Closed)?;
        let token = CancellationToken::new();

        if let Err(e) = connect_with_retry(&mut transport, &self.policy, &self.status, &token, false).await {
            error!("stream connect failed after {} attempts: {}", self.policy.max_attempts, e);
            self.status.send_replace(ConnectionStatus::Failed);
            self.transport = Some(transport);
            return Err(e);
        }

        lock(&self.registry).closed = false;
        self.status.send_replace(ConnectionStatus::Connected);
        info!("stream connected");

        let handle = tokio::spawn(pump(
            transport,
            self.registry.clone(),
            self.policy,
            self.status.clone(),
            token.clone(),
        ));
        self.pump = Some((token, handle));
        Ok(())
    }

    /// Teardown: release every handler, stop the pump, close the transport.
    pub async fn close(&mut self) {
        lock(&self.registry).clear();
        if let Some((token, handle)) = self.pump.take() {
            token.cancel();
            match handle.await {
                Ok(transport) => self.transport = Some(transport),
                Err(e) => warn!("stream pump ended abnormally: {}", e),
            }
        }
        self.status.send_replace(ConnectionStatus::Disconnected);
        info!("stream closed");
    }

    /// Explicit reconnect. Handlers are released; callers subscribe again.
    pub async fn reconnect(&mut self) -> Result<(), TransportError> {
        self.close().await;
        self.open().await
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        lock(&self.registry).clear();
        if let Some((token, _)) = self.pump.take() {
            token.cancel();
        }
    }
}

async fn connect_with_retry<T: Transport>(
    transport: &mut T,
    policy: &ReconnectPolicy,
    status: &watch::Sender<ConnectionStatus>,
    token: &CancellationToken,
    reconnecting: bool,
) -> Result<(), TransportError> {
    let attempts = policy.max_attempts.max(1);
    let mut last = TransportError::Closed;

    for attempt in 1..=attempts {
        if reconnecting || attempt > 1 {
            tokio::select! {
                _ = token.cancelled() => return Err(TransportError::Closed),
                _ = tokio::time::sleep(policy.delay) => {}
            }
        }
        let next = if reconnecting || attempt > 1 {
            ConnectionStatus::Reconnecting { attempt }
        } else {
            ConnectionStatus::Connecting
        };
        status.send_replace(next);

        match transport.connect().await {
            Ok(()) => return Ok(()),
            // Feed ended for good; retrying cannot bring it back
            Err(TransportError::Closed) => return Err(TransportError::Closed),
            Err(e) => {
                warn!(attempt, "stream connect attempt failed: {}", e);
                last = e;
            }
        }
    }
    Err(last)
}

async fn pump<T: Transport>(
    mut transport: T,
    registry: Arc<Mutex<Registry>>,
    policy: ReconnectPolicy,
    status: Arc<watch::Sender<ConnectionStatus>>,
    token: CancellationToken,
) -> T {
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = transport.next_event() => next,
        };

        match next {
            Ok(Some(raw)) => {
                let delivered = dispatch(&registry, &raw);
                if delivered == 0 {
                    debug!(event = %raw.event, "no handler for event");
                }
            }
            Ok(None) | Err(_) => {
                match &next {
                    Err(e) => warn!("stream dropped: {}", e),
                    _ => warn!("stream ended by remote"),
                }
                status.send_replace(ConnectionStatus::Disconnected);

                match connect_with_retry(&mut transport, &policy, &status, &token, true).await {
                    Ok(()) => {
                        info!("stream reconnected");
                        status.send_replace(ConnectionStatus::Connected);
                    }
                    Err(TransportError::Closed) if token.is_cancelled() => break,
                    Err(e) => {
                        error!("stream reconnect gave up after {} attempts: {}", policy.max_attempts, e);
                        status.send_replace(ConnectionStatus::Failed);
                        break;
                    }
                }
            }
        }
    }
    transport.close().await;
    transport
}
