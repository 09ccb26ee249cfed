//! Message relay / connection proxy.
//!
//! Presents a connection-like interface (`connect`, `emit`, `on`) to the
//! rest of the background logic while physically forwarding every operation
//! to the relay host over point-to-point messaging. No socket object exists
//! in this execution context: readiness is an explicit gate, outbound
//! operations buffer until the host announces it, and inbound socket events
//! are demultiplexed to local subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use tp_protocol::{CoreBound, HostBound};

use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};
use crate::relay::lifecycle::{HostRuntime, RelayHostManager};
use crate::relay::queue::{PendingAck, PendingOutbound};

/// Delivery seam toward the relay host.
///
/// Implementations classify missing-receiver failures as
/// [`Error::NoReceiver`] so the proxy can re-create the host before retrying.
#[async_trait]
pub trait RelayPort: Send + Sync + 'static {
    async fn deliver(&self, message: HostBound) -> Result<()>;
}

/// Identifier returned by `on`/`once`, used to deregister a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

/// Subscriber callback for inbound socket events.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

struct Subscriber {
    id: HandlerId,
    once: bool,
    handler: EventHandler,
}

struct ProxyInner<P, R> {
    port: Arc<P>,
    host: RelayHostManager<R>,
    pending: Mutex<PendingOutbound>,
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
    pending_acks: Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>,
    next_ack_id: AtomicU64,
    next_handler_id: AtomicU64,
    ready: AtomicBool,
    connected: AtomicBool,
    flush_lock: tokio::sync::Mutex<()>,
    config: CoordinatorConfig,
}

/// Connection proxy handle. Cheap to clone; clones share all state.
pub struct SocketProxy<P, R> {
    inner: Arc<ProxyInner<P, R>>,
}

impl<P, R> Clone for SocketProxy<P, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: RelayPort, R: HostRuntime> SocketProxy<P, R> {
    pub fn new(port: Arc<P>, host: RelayHostManager<R>, config: CoordinatorConfig) -> Self {
        let inner = Arc::new(ProxyInner {
            port,
            host: host.clone(),
            pending: Mutex::new(PendingOutbound::new(config.ack_queue_cap)),
            subscribers: Mutex::new(HashMap::new()),
            pending_acks: Mutex::new(HashMap::new()),
            next_ack_id: AtomicU64::new(0),
            next_handler_id: AtomicU64::new(0),
            ready: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            flush_lock: tokio::sync::Mutex::new(()),
            config,
        });

        // A freshly created host has not announced readiness yet.
        let weak = Arc::downgrade(&inner);
        host.set_on_created(move || {
            if let Some(inner) = weak.upgrade() {
                inner.ready.store(false, Ordering::SeqCst);
            }
        });

        Self { inner }
    }

    /// True while the relay host reports its realtime connection open.
    pub fn connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// True after the relay host announced readiness and until a disconnect.
    pub fn ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Clears the readiness gate without touching in-flight sends.
    pub fn mark_not_ready(&self) {
        self.inner.ready.store(false, Ordering::SeqCst);
    }

    /// Asks the relay host to (re)establish its realtime connection.
    ///
    /// Returns once the request is handed off; connection success arrives
    /// later as a `SocketStatus` message.
    pub async fn connect(&self) {
        if let Err(err) = self.inner.host.ensure().await {
            warn!(target: "tp.proxy", error = %err, "connect: relay host unavailable");
        }
        let _ = self.send_raw(HostBound::SocketConnect, false).await;
    }

    /// Fire-and-forget emission. Never fails; while the host is not ready
    /// the latest payload per event name is buffered.
    pub async fn emit(&self, event: &str, args: Value) {
        self.spawn_ensure();
        if !self.ready() {
            self.inner.pending.lock().coalesce(event, args);
            return;
        }
        let message = HostBound::SocketEmit {
            event: event.to_string(),
            args,
            expect_ack: false,
            ack_id: None,
        };
        let _ = self.send_raw(message, false).await;
    }

    /// Emission whose caller needs the correlated reply.
    ///
    /// While the host is not ready the message joins the bounded ordered-ack
    /// queue; overflow fails the oldest caller with [`Error::AckQueueFull`].
    pub async fn emit_with_ack(&self, event: &str, args: Value) -> Result<Value> {
        self.spawn_ensure();
        if !self.ready() {
            let (tx, rx) = oneshot::channel();
            self.inner.pending.lock().push_ordered(PendingAck {
                event: event.to_string(),
                args,
                reply: tx,
            });
            return rx.await.map_err(|_| Error::ChannelClosed)?;
        }
        self.send_with_ack(event.to_string(), args).await
    }

    /// Subscribes to an inbound socket event. Handlers run synchronously in
    /// registration order.
    pub fn on<F: Fn(&Value) + Send + Sync + 'static>(&self, event: &str, handler: F) -> HandlerId {
        self.register(event, false, Arc::new(handler))
    }

    /// Subscribes for a single invocation.
    pub fn once<F: Fn(&Value) + Send + Sync + 'static>(
        &self,
        event: &str,
        handler: F,
    ) -> HandlerId {
        self.register(event, true, Arc::new(handler))
    }

    /// Removes a subscriber registered with [`Self::on`] or [`Self::once`].
    pub fn off(&self, event: &str, id: HandlerId) {
        let mut subscribers = self.inner.subscribers.lock();
        if let Some(list) = subscribers.get_mut(event) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                subscribers.remove(event);
            }
        }
    }

    /// Handles one message arriving from the relay host.
    pub async fn handle_host_message(&self, message: CoreBound) {
        match message {
            CoreBound::OffscreenReady { at_ms, connection_id } => {
                debug!(target: "tp.proxy", at_ms, %connection_id, "relay host ready");
                self.inner.ready.store(true, Ordering::SeqCst);
                self.flush().await;
            }
            CoreBound::SocketStatus { connected } => {
                self.inner.connected.store(connected, Ordering::SeqCst);
                if !connected {
                    self.inner.ready.store(false, Ordering::SeqCst);
                }
                let event = if connected { "connect" } else { "disconnect" };
                self.dispatch(event, &Value::Null);
            }
            CoreBound::SocketEvent { event, args } => {
                self.dispatch(&event, &args);
            }
            CoreBound::SocketAck { id, args } => {
                match self.inner.pending_acks.lock().remove(&id) {
                    Some(tx) => {
                        let _ = tx.send(Ok(args));
                    }
                    None => warn!(target: "tp.proxy", id, "ack with no waiting caller"),
                }
            }
        }
    }

    fn register(&self, event: &str, once: bool, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.inner.next_handler_id.fetch_add(1, Ordering::SeqCst));
        self.inner
            .subscribers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Subscriber { id, once, handler });
        id
    }

    fn dispatch(&self, event: &str, args: &Value) {
        let handlers: Vec<EventHandler> = {
            let mut subscribers = self.inner.subscribers.lock();
            let Some(list) = subscribers.get_mut(event) else {
                return;
            };
            let handlers = list.iter().map(|s| Arc::clone(&s.handler)).collect();
            list.retain(|s| !s.once);
            if list.is_empty() {
                subscribers.remove(event);
            }
            handlers
        };
        for handler in handlers {
            handler(args);
        }
    }

    /// Opportunistic self-heal: every emit path requests the host exist,
    /// independent of queuing.
    fn spawn_ensure(&self) {
        let host = self.inner.host.clone();
        tokio::spawn(async move {
            let _ = host.ensure().await;
        });
    }

    async fn send_with_ack(&self, event: String, args: Value) -> Result<Value> {
        let id = self.inner.next_ack_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.inner.pending_acks.lock().insert(id, tx);

        let message = HostBound::SocketEmit {
            event: event.clone(),
            args,
            expect_ack: true,
            ack_id: Some(id),
        };
        if let Err(err) = self.send_raw(message, true).await {
            self.inner.pending_acks.lock().remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.inner.config.ack_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                self.inner.pending_acks.lock().remove(&id);
                Err(Error::AckTimeout(event))
            }
        }
    }

    /// Delivery primitive: bounded retries, opportunistic host re-creation
    /// on missing-receiver failures, and swallow-on-fire-and-forget.
    async fn send_raw(&self, message: HostBound, expects_response: bool) -> Result<()> {
        let attempts = self.inner.config.delivery_attempts.max(1);
        for attempt in 1..=attempts {
            match self.inner.port.deliver(message.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_no_receiver() => {
                    debug!(
                        target: "tp.proxy",
                        attempt,
                        event = message.event_name().unwrap_or("socket_connect"),
                        "no receiver; ensuring relay host before retry"
                    );
                    // The host is gone, so its readiness announcement and
                    // the cached existence probe are both stale.
                    self.inner.host.mark_gone();
                    self.mark_not_ready();
                    let _ = self.inner.host.ensure().await;
                    tokio::time::sleep(self.inner.config.delivery_retry_delay).await;
                }
                Err(err) => {
                    if expects_response {
                        return Err(err);
                    }
                    warn!(target: "tp.proxy", error = %err, "fire-and-forget delivery failed; dropping");
                    return Ok(());
                }
            }
        }

        let err = Error::Transport(format!("no receiver after {attempts} attempts"));
        if expects_response {
            Err(err)
        } else {
            warn!(target: "tp.proxy", error = %err, "fire-and-forget delivery exhausted retries; dropping");
            Ok(())
        }
    }

    /// Flushes buffered messages after a readiness announcement.
    ///
    /// Coalesced entries go out concurrently (only the latest value per key
    /// exists, order across keys is irrelevant); ordered-ack entries go out
    /// strictly in enqueue order, each awaited before the next. Single-flight:
    /// a readiness signal during a flush awaits the same flush.
    async fn flush(&self) {
        let _guard = self.inner.flush_lock.lock().await;
        loop {
            let (coalesced, ordered) = {
                let mut pending = self.inner.pending.lock();
                if pending.is_empty() {
                    return;
                }
                pending.drain()
            };

            let sends = coalesced.into_iter().map(|(event, args)| {
                let proxy = self.clone();
                async move {
                    let message = HostBound::SocketEmit {
                        event,
                        args,
                        expect_ack: false,
                        ack_id: None,
                    };
                    let _ = proxy.send_raw(message, false).await;
                }
            });
            join_all(sends).await;

            for PendingAck { event, args, reply } in ordered {
                let result = self.send_with_ack(event, args).await;
                let _ = reply.send(result);
            }
        }
    }
}
