//! Persistent-connection state machine
//!
//! # Lifecycle
//!
//! ```text
//!                 connect()                transport open
//!  disconnected ─────────────► connecting ───────────────► connected
//!       ▲                        │    ▲                        │
//!       │ disconnect()           │    │ timer fires            │ close /
//!       │ (from any state)       │    │                        │ transport error
//!       │              failure   ▼    │                        ▼
//!       └──────────── reconnecting ◄──┴────────────────── reconnecting
//!                          │
//!                          │ attempt > budget
//!                          ▼
//!                        error (terminal until connect() is called again)
//! ```
//!
//! Reconnection delays grow exponentially with jitter (see
//! [`StreamConfig::reconnect_delay`]); a successful connection resets the
//! attempt counter. `disconnect()` is manual and final: it cancels every
//! pending timer and in-flight handshake, and nothing reconnects afterwards.
//!
//! Cancellation uses a generation counter. Every spawned task carries the
//! generation it was born under; `disconnect()` and a fresh `connect()` bump
//! the counter, so stragglers that survive the `abort()` notice they are
//! stale at their next checkpoint and exit without touching shared state.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::message::{parse_frame, StreamMessage};
use crate::transport::{FrameSink, FrameSource, StreamTransport, WebSocketTransport};

/// Externally observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnection gave up; only an explicit `connect()` leaves this state.
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Error => "error",
        };
        f.write_str(name)
    }
}

type MessageFn = Box<dyn Fn(StreamMessage) + Send + Sync>;
type StatusFn = Box<dyn Fn(ConnectionStatus) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&StreamError) + Send + Sync>;
type ReconnectFn = Box<dyn Fn(u32, u32) + Send + Sync>;

/// Subscriber hooks, invoked from the manager's background tasks.
///
/// Hooks must not block; they run on the connection driver. Unset hooks are
/// simply skipped.
#[derive(Default)]
pub struct StreamCallbacks {
    on_message: Option<MessageFn>,
    on_status_change: Option<StatusFn>,
    on_error: Option<ErrorFn>,
    on_reconnect_attempt: Option<ReconnectFn>,
}

impl StreamCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per well-formed inbound frame, in arrival order.
    pub fn on_message(mut self, hook: impl Fn(StreamMessage) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Box::new(hook));
        self
    }

    /// Called exactly once per status transition, never for a non-change.
    pub fn on_status_change(
        mut self,
        hook: impl Fn(ConnectionStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_status_change = Some(Box::new(hook));
        self
    }

    /// Called for every failure the manager observes: handshake errors,
    /// transport errors, malformed frames, and reconnection exhaustion.
    pub fn on_error(mut self, hook: impl Fn(&StreamError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Called when a reconnection attempt is scheduled, with the attempt
    /// number and the configured budget.
    pub fn on_reconnect_attempt(mut self, hook: impl Fn(u32, u32) + Send + Sync + 'static) -> Self {
        self.on_reconnect_attempt = Some(Box::new(hook));
        self
    }

    fn emit_message(&self, message: StreamMessage) {
        if let Some(hook) = &self.on_message {
            hook(message);
        }
    }

    fn emit_status(&self, status: ConnectionStatus) {
        if let Some(hook) = &self.on_status_change {
            hook(status);
        }
    }

    fn emit_error(&self, error: &StreamError) {
        if let Some(hook) = &self.on_error {
            hook(error);
        }
    }

    fn emit_reconnect_attempt(&self, attempt: u32, max: u32) {
        if let Some(hook) = &self.on_reconnect_attempt {
            hook(attempt, max);
        }
    }
}

/// The write half lives behind its own lock, never the state lock, so a
/// sink blocked on transport backpressure can stall only other senders.
type SinkSlot = Arc<Mutex<Option<Box<dyn FrameSink>>>>;

struct Inner {
    status: ConnectionStatus,
    /// Consecutive failed connection attempts since the last success.
    attempt: u32,
    /// Bumped by `disconnect()` and `connect()`; stale tasks see a mismatch.
    generation: u64,
    manual_disconnect: bool,
    /// Slot for the current connection's write half. Replaced wholesale on
    /// connect and disconnect; a stale sender keeps only the old slot.
    sink: SinkSlot,
    tasks: Vec<JoinHandle<()>>,
    last_activity: Option<Instant>,
}

struct Shared {
    config: StreamConfig,
    transport: Arc<dyn StreamTransport>,
    callbacks: StreamCallbacks,
    inner: Mutex<Inner>,
}

/// Owns one logical stream: the connection, its reconnection schedule, and
/// the subscriber callbacks.
pub struct StreamManager {
    shared: Arc<Shared>,
}

impl StreamManager {
    /// Manager over the production WebSocket transport.
    pub fn new(config: StreamConfig, callbacks: StreamCallbacks) -> Self {
        Self::with_transport(config, callbacks, Arc::new(WebSocketTransport))
    }

    pub fn with_transport(
        config: StreamConfig,
        callbacks: StreamCallbacks,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                callbacks,
                inner: Mutex::new(Inner {
                    status: ConnectionStatus::Disconnected,
                    attempt: 0,
                    generation: 0,
                    manual_disconnect: false,
                    sink: Arc::new(Mutex::new(None)),
                    tasks: Vec::new(),
                    last_activity: None,
                }),
            }),
        }
    }

    /// Open the stream. No-op while a connection is already live or being
    /// established; from `Disconnected` or terminal `Error` it starts a fresh
    /// attempt with a fresh reconnection budget.
    pub async fn connect(&self) {
        let generation;
        {
            let mut inner = self.shared.inner.lock().await;
            if matches!(
                inner.status,
                ConnectionStatus::Connecting | ConnectionStatus::Connected
            ) {
                debug!(status = %inner.status, "connect ignored; already in progress");
                return;
            }
            inner.manual_disconnect = false;
            inner.attempt = 0;
            // Invalidate timers left over from a previous life
            inner.generation += 1;
            generation = inner.generation;
            inner.status = ConnectionStatus::Connecting;
        }
        self.shared.callbacks.emit_status(ConnectionStatus::Connecting);
        info!(url = %self.shared.config.url, "opening stream");

        let task = tokio::spawn(drive_connection(self.shared.clone(), generation));
        register_task(&self.shared, task).await;
    }

    /// Close the stream and cancel all pending work. Safe from any state;
    /// emits at most one `Disconnected` transition.
    pub async fn disconnect(&self) {
        let (tasks, slot) = {
            let mut inner = self.shared.inner.lock().await;
            inner.manual_disconnect = true;
            inner.generation += 1;
            inner.attempt = 0;
            let slot = std::mem::replace(&mut inner.sink, Arc::new(Mutex::new(None)));
            (std::mem::take(&mut inner.tasks), slot)
        };
        for task in tasks {
            task.abort();
        }
        // Best-effort close. If an in-flight send holds the slot we do not
        // wait for it; the old connection is already unreachable from the
        // manager and gets torn down when the sender lets go.
        if let Ok(mut sink) = slot.try_lock() {
            if let Some(mut sink) = sink.take() {
                sink.close().await;
            }
        }
        set_status(&self.shared, ConnectionStatus::Disconnected).await;
        info!("stream disconnected");
    }

    /// Serialize `message` and send it over the live connection.
    ///
    /// Fails with [`StreamError::NotConnected`] in every state except
    /// `Connected`; messages are never queued for later delivery.
    pub async fn send<M: Serialize>(&self, message: &M) -> Result<(), StreamError> {
        let text = serde_json::to_string(message)?;
        // Snapshot the sink slot under the state lock, then release it
        // before the transport write: a slow sink must never stall
        // disconnect(), status() or the read loop.
        let slot = {
            let inner = self.shared.inner.lock().await;
            if inner.status != ConnectionStatus::Connected {
                return Err(StreamError::NotConnected);
            }
            inner.sink.clone()
        };
        let mut sink = slot.lock().await;
        match sink.as_mut() {
            Some(sink) => sink.send_text(&text).await,
            None => Err(StreamError::NotConnected),
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.shared.inner.lock().await.status
    }

    pub async fn is_connected(&self) -> bool {
        self.status().await == ConnectionStatus::Connected
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        // Best effort: if the lock is free, stop background tasks now.
        // Stale-generation checks cover the contended case.
        if let Ok(mut inner) = self.shared.inner.try_lock() {
            inner.manual_disconnect = true;
            inner.generation += 1;
            for task in inner.tasks.drain(..) {
                task.abort();
            }
        }
    }
}

async fn register_task(shared: &Arc<Shared>, task: JoinHandle<()>) {
    let mut inner = shared.inner.lock().await;
    inner.tasks.retain(|t| !t.is_finished());
    inner.tasks.push(task);
}

async fn is_stale(shared: &Arc<Shared>, generation: u64) -> bool {
    let inner = shared.inner.lock().await;
    inner.generation != generation || inner.manual_disconnect
}

/// Record a transition and notify the subscriber, outside the lock.
async fn set_status(shared: &Arc<Shared>, status: ConnectionStatus) {
    let changed = {
        let mut inner = shared.inner.lock().await;
        if inner.status == status {
            false
        } else {
            inner.status = status;
            true
        }
    };
    if changed {
        debug!(%status, "stream status changed");
        shared.callbacks.emit_status(status);
    }
}

/// One handshake plus, on success, the read loop until the connection dies.
///
/// Boxed because the future is recursive (`drive_connection` →
/// `schedule_reconnect` → timer task → `reenter_connect` →
/// `drive_connection`); boxing gives the cycle a sized, nameable type.
fn drive_connection(
    shared: Arc<Shared>,
    generation: u64,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let connect = shared.transport.connect(&shared.config.url);
        let outcome = tokio::time::timeout(shared.config.connect_timeout, connect).await;

        if is_stale(&shared, generation).await {
            return;
        }

        let (sink, source) = match outcome {
            Ok(Ok(halves)) => halves,
            Ok(Err(err)) => {
                warn!(error = %err, "stream handshake failed");
                shared.callbacks.emit_error(&err);
                schedule_reconnect(shared).await;
                return;
            }
            Err(_elapsed) => {
                let err = StreamError::ConnectTimeout(shared.config.connect_timeout);
                warn!(error = %err, "stream handshake failed");
                shared.callbacks.emit_error(&err);
                schedule_reconnect(shared).await;
                return;
            }
        };

        {
            let mut inner = shared.inner.lock().await;
            if inner.generation != generation || inner.manual_disconnect {
                return;
            }
            inner.sink = Arc::new(Mutex::new(Some(sink)));
            inner.attempt = 0;
            inner.last_activity = Some(Instant::now());
        }
        set_status(&shared, ConnectionStatus::Connected).await;
        info!(url = %shared.config.url, "stream connected");

        let heartbeat = tokio::spawn(heartbeat_loop(shared.clone(), generation));
        register_task(&shared, heartbeat).await;

        read_loop(shared, generation, source).await;
    })
}

async fn read_loop(shared: Arc<Shared>, generation: u64, mut source: Box<dyn FrameSource>) {
    loop {
        let item = source.next_frame().await;
        if is_stale(&shared, generation).await {
            return;
        }
        match item {
            Some(Ok(text)) => {
                {
                    shared.inner.lock().await.last_activity = Some(Instant::now());
                }
                match parse_frame(&text) {
                    Ok(message) => {
                        debug!(kind = message.kind(), "stream message received");
                        shared.callbacks.emit_message(message);
                    }
                    // Malformed frames are dropped, reported once each, and
                    // never tear down the connection
                    Err(err) => {
                        warn!(error = %err, "dropping malformed frame");
                        shared.callbacks.emit_error(&err);
                    }
                }
            }
            Some(Err(err)) => {
                warn!(error = %err, "stream transport failed");
                shared.callbacks.emit_error(&err);
                handle_connection_loss(shared, generation).await;
                return;
            }
            None => {
                info!("stream closed by peer");
                handle_connection_loss(shared, generation).await;
                return;
            }
        }
    }
}

async fn handle_connection_loss(shared: Arc<Shared>, generation: u64) {
    {
        let mut inner = shared.inner.lock().await;
        if inner.generation != generation || inner.manual_disconnect {
            return;
        }
        inner.sink = Arc::new(Mutex::new(None));
        inner.last_activity = None;
    }
    schedule_reconnect(shared).await;
}

/// Count the failure and either arm the next reconnection timer or give up.
async fn schedule_reconnect(shared: Arc<Shared>) {
    let (attempt, generation) = {
        let mut inner = shared.inner.lock().await;
        if inner.manual_disconnect {
            return;
        }
        inner.attempt += 1;
        (inner.attempt, inner.generation)
    };

    let budget = shared.config.max_reconnect_attempts;
    if attempt > budget {
        warn!(attempts = budget, "reconnection budget exhausted; giving up");
        set_status(&shared, ConnectionStatus::Error).await;
        shared
            .callbacks
            .emit_error(&StreamError::ReconnectExhausted { attempts: budget });
        return;
    }

    set_status(&shared, ConnectionStatus::Reconnecting).await;
    shared.callbacks.emit_reconnect_attempt(attempt, budget);

    let delay = shared.config.reconnect_delay(attempt);
    debug!(attempt, budget, ?delay, "reconnection scheduled");

    let timer = tokio::spawn({
        let shared = shared.clone();
        async move {
            tokio::time::sleep(delay).await;
            if is_stale(&shared, generation).await {
                return;
            }
            reenter_connect(shared, generation).await;
        }
    });
    register_task(&shared, timer).await;
}

/// Timer-driven re-entry into the connect sequence; already on a spawned task.
async fn reenter_connect(shared: Arc<Shared>, generation: u64) {
    {
        let mut inner = shared.inner.lock().await;
        if inner.generation != generation || inner.manual_disconnect {
            return;
        }
        if matches!(
            inner.status,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        ) {
            return;
        }
        inner.status = ConnectionStatus::Connecting;
    }
    shared.callbacks.emit_status(ConnectionStatus::Connecting);
    drive_connection(shared, generation).await;
}

/// Periodic liveness marker. Purely observational: it logs how long the
/// connection has been idle so operators can spot stuck backends, and exits
/// as soon as its connection generation is gone.
async fn heartbeat_loop(shared: Arc<Shared>, generation: u64) {
    let mut ticker = tokio::time::interval(shared.config.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // first tick completes immediately
    loop {
        ticker.tick().await;
        let inner = shared.inner.lock().await;
        if inner.generation != generation || inner.status != ConnectionStatus::Connected {
            return;
        }
        let idle = inner
            .last_activity
            .map(|at| at.elapsed())
            .unwrap_or_default();
        drop(inner);
        debug!(idle_ms = idle.as_millis() as u64, "stream heartbeat");
    }
}
