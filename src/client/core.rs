//! Connection state machine.
//!
//! [`RealtimeClient`] owns the single live transport to the game server and
//! drives the whole lifecycle: connect, disconnect, manual reconnect,
//! outbound sends, and the bounded exponential-backoff retry loop after
//! abnormal closes.
//!
//! # Event Loop
//!
//! Each successful connect spawns one I/O task that handles:
//!
//! - Inbound frames, processed strictly in arrival order and fed to the
//!   [`MessageDispatcher`]
//! - Outbound frames from [`RealtimeClient::send_message`]
//! - Close frames and transport errors, which feed the retry policy
//!
//! # Retry Supersession
//!
//! Every pending retry timer captures the current *connect epoch*.
//! `disconnect()`, `reconnect()` and `shutdown()` bump the epoch, so a
//! stale timer that still fires re-validates and becomes a no-op instead of
//! racing a fresh connection.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::auth::AuthGate;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::ServerMessage;
use crate::transport::{Connector, NORMAL_CLOSURE, Transport, TransportEvent, WsConnector};

use super::dispatch::MessageDispatcher;
use super::history::{HistoryBuffer, HistoryEntry};
use super::listeners::{ListenerId, ListenerRegistry, MessageFilter};
use super::reconnect::ReconnectState;
use super::state::ConnectionState;

// ============================================================================
// TransportCommand
// ============================================================================

/// Commands for the per-connection I/O task.
enum TransportCommand {
    /// Write one serialized frame.
    Send(String),

    /// Close the transport with the given code and reason.
    Shutdown {
        /// Close code to send.
        code: u16,
        /// Close reason to send.
        reason: &'static str,
    },
}

// ============================================================================
// Shared
// ============================================================================

/// Mutable state behind the lock.
struct Shared {
    /// Current lifecycle state.
    state: ConnectionState,

    /// Human-readable reason for the last failure, if any.
    last_error: Option<String>,

    /// Retry bookkeeping.
    reconnect: ReconnectState,

    /// Writer half of the live I/O task, present only while a transport is
    /// open or opening has completed.
    writer: Option<mpsc::UnboundedSender<TransportCommand>>,
}

// ============================================================================
// Inner
// ============================================================================

/// State shared between the public handle, I/O tasks and retry timers.
struct Inner {
    /// Client configuration.
    config: ClientConfig,

    /// Factory for new transports.
    connector: Arc<dyn Connector>,

    /// Authentication signal source.
    auth: Arc<dyn AuthGate>,

    /// Lock-protected mutable state. Never held across an await.
    shared: Mutex<Shared>,

    /// State-changed notifications for observers.
    state_tx: watch::Sender<ConnectionState>,

    /// Subscriber registry.
    listeners: Arc<ListenerRegistry>,

    /// Bounded message history.
    history: Arc<HistoryBuffer>,

    /// Inbound frame dispatcher.
    dispatcher: MessageDispatcher,

    /// Connect epoch; bumped by disconnect/reconnect/shutdown to supersede
    /// in-flight connects and pending retries.
    epoch: AtomicU64,
}

// ============================================================================
// RealtimeClient
// ============================================================================

/// Persistent connection manager for the City realtime channel.
///
/// Constructed once at application start and alive for the whole session.
/// The handle is cheap to clone; all clones share one connection.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use city_realtime::{AuthHandle, ClientConfig, MessageType, RealtimeClient, ServerMessage};
///
/// let auth = AuthHandle::new(true);
/// let client = RealtimeClient::new("wss://play.example.com/ws", Arc::new(auth.clone()))?;
///
/// client.add_message_listener(MessageType::Chat, |msg| {
///     println!("chat in room {}: {:?}", msg.room, msg.get_str("content"));
/// });
///
/// client.connect();
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

// ============================================================================
// Constructors
// ============================================================================

impl RealtimeClient {
    /// Creates a client that dials `url` with the default configuration.
    ///
    /// No I/O happens until [`connect`](Self::connect) is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `url` is not a valid `ws`/`wss` URL.
    pub fn new(url: impl AsRef<str>, auth: Arc<dyn AuthGate>) -> Result<Self> {
        Self::with_config(url, auth, ClientConfig::default())
    }

    /// Creates a client that dials `url` with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `url` is not a valid `ws`/`wss` URL.
    pub fn with_config(
        url: impl AsRef<str>,
        auth: Arc<dyn AuthGate>,
        config: ClientConfig,
    ) -> Result<Self> {
        let connector = Arc::new(WsConnector::new(url)?);
        Ok(Self::with_connector(connector, auth, config))
    }

    /// Creates a client over an arbitrary [`Connector`].
    ///
    /// This is the seam tests use to drive the state machine with scripted
    /// transports.
    #[must_use]
    pub fn with_connector(
        connector: Arc<dyn Connector>,
        auth: Arc<dyn AuthGate>,
        config: ClientConfig,
    ) -> Self {
        let listeners = Arc::new(ListenerRegistry::new());
        let history = Arc::new(HistoryBuffer::new(config.history_capacity));
        let dispatcher = MessageDispatcher::new(Arc::clone(&listeners), Arc::clone(&history));
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let reconnect = ReconnectState::new(&config.reconnect);

        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                auth,
                shared: Mutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    last_error: None,
                    reconnect,
                    writer: None,
                }),
                state_tx,
                listeners,
                history,
                dispatcher,
                epoch: AtomicU64::new(0),
            }),
        }
    }
}

// ============================================================================
// Lifecycle Operations
// ============================================================================

impl RealtimeClient {
    /// Opens the connection.
    ///
    /// Guarded no-op with a warning if the authentication signal is false or
    /// a transport is already open or opening. On success the state runs
    /// Connecting → Connected and the retry counters reset.
    pub fn connect(&self) {
        Inner::begin_connect(&self.inner);
    }

    /// Closes the connection intentionally.
    ///
    /// Sends the normal-closure code, supersedes any pending retry, and
    /// resets the attempt counter. Idempotent when already disconnected.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        inner.epoch.fetch_add(1, Ordering::SeqCst);

        let mut shared = inner.shared.lock();
        if let Some(writer) = shared.writer.take() {
            let _ = writer.send(TransportCommand::Shutdown {
                code: NORMAL_CLOSURE,
                reason: "client disconnect",
            });
        }
        shared.reconnect.attempts = 0;
        inner.set_state(&mut shared, ConnectionState::Disconnected);
    }

    /// Forces a fresh connection.
    ///
    /// Disconnects, resets the retry state to zero attempts at the base
    /// delay, and connects immediately, bypassing any pending scheduled
    /// retry. This is the designated exit from the terminal error state.
    pub fn reconnect(&self) {
        info!("Manual reconnect requested");
        self.disconnect();
        {
            let mut shared = self.inner.shared.lock();
            let policy = self.inner.config.reconnect.clone();
            shared.reconnect.reset(&policy);
        }
        self.connect();
    }

    /// Sends a message to the server.
    ///
    /// Returns `true` only if the connection is established and the frame
    /// was handed to the transport writer. Messages are never queued while
    /// disconnected; a `false` return means the caller must retry later.
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        let shared = self.inner.shared.lock();

        if shared.state != ConnectionState::Connected {
            warn!(state = %shared.state, "Not connected; dropping outbound message");
            return false;
        }

        let Some(writer) = &shared.writer else {
            warn!("No live transport; dropping outbound message");
            return false;
        };

        match serde_json::to_string(message).map_err(Error::from) {
            Ok(json) => writer.send(TransportCommand::Send(json)).is_ok(),
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound message");
                false
            }
        }
    }

    /// Clears the last error.
    ///
    /// Additionally transitions Error → Disconnected so a fresh connect can
    /// proceed.
    pub fn clear_error(&self) {
        let mut shared = self.inner.shared.lock();
        shared.last_error = None;
        if shared.state == ConnectionState::Error {
            self.inner
                .set_state(&mut shared, ConnectionState::Disconnected);
        }
    }

    /// Tears the client down.
    ///
    /// Closes the transport, supersedes pending retries, and clears all
    /// listeners. The handle remains usable; a later `connect()` starts
    /// over from scratch.
    pub fn shutdown(&self) {
        debug!("Client shutdown");
        self.disconnect();
        self.inner.listeners.clear(None);
    }

    /// Reacts to authentication transitions.
    ///
    /// Spawns a task that connects when the signal turns true and
    /// disconnects when it turns false. The task ends when the auth signal
    /// source is dropped.
    pub fn drive_auth(&self) -> tokio::task::JoinHandle<()> {
        let client = self.clone();
        let mut rx = self.inner.auth.subscribe();

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let authenticated = *rx.borrow_and_update();
                if authenticated {
                    debug!("Auth signal on; connecting");
                    client.connect();
                } else {
                    debug!("Auth signal off; disconnecting");
                    client.disconnect();
                }
            }
            debug!("Auth signal source dropped");
        })
    }
}

// ============================================================================
// Listener Operations
// ============================================================================

impl RealtimeClient {
    /// Registers a listener for messages matching `filter`.
    ///
    /// Use [`MessageFilter::Any`] (or pass a concrete
    /// [`MessageType`](crate::MessageType)) to choose the scope.
    pub fn add_message_listener<F>(
        &self,
        filter: impl Into<MessageFilter>,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.inner.listeners.add(filter, callback)
    }

    /// Registers a one-shot listener; it fires for exactly one matching
    /// message and is then gone.
    pub fn once_message<F>(&self, filter: impl Into<MessageFilter>, callback: F) -> ListenerId
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.inner.listeners.once(filter, callback)
    }

    /// Removes one listener registration.
    pub fn remove_message_listener(&self, filter: impl Into<MessageFilter>, id: ListenerId) -> bool {
        self.inner.listeners.remove(filter, id)
    }

    /// Removes all listeners for one filter, or every listener if `None`.
    pub fn clear_message_listeners(&self, filter: Option<MessageFilter>) {
        self.inner.listeners.clear(filter);
    }
}

// ============================================================================
// Observable State
// ============================================================================

impl RealtimeClient {
    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Returns `true` if the connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Returns `true` if a connect attempt is in flight.
    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.state().is_connecting()
    }

    /// Returns `true` if the connection is in the error state.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.state().is_error()
    }

    /// Returns the last failure reason, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.shared.lock().last_error.clone()
    }

    /// Returns the number of reconnect attempts since the last successful
    /// connect or reset.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.lock().reconnect.attempts
    }

    /// Returns the maximum number of automatic reconnect attempts.
    #[inline]
    #[must_use]
    pub fn max_reconnect_attempts(&self) -> u32 {
        self.inner.config.reconnect.max_attempts
    }

    /// Returns the most recently received message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<ServerMessage> {
        self.inner.history.last()
    }

    /// Returns a snapshot of the message history, oldest first.
    #[must_use]
    pub fn message_history(&self) -> Vec<HistoryEntry> {
        self.inner.history.entries()
    }

    /// Empties the message history.
    pub fn clear_message_history(&self) {
        self.inner.history.clear();
    }

    /// Subscribes to connection state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }
}

// ============================================================================
// State Machine Internals
// ============================================================================

impl Inner {
    /// Updates the state and notifies observers.
    fn set_state(&self, shared: &mut Shared, state: ConnectionState) {
        if shared.state != state {
            debug!(from = %shared.state, to = %state, "Connection state changed");
        }
        shared.state = state;
        self.state_tx.send_replace(state);
    }

    /// Reflects a failure into observable state, unless a disconnect or
    /// reconnect has superseded the connection the failure belongs to.
    fn mark_error(&self, epoch: u64, message: String) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Stale transport error; ignoring");
            return;
        }
        let mut shared = self.shared.lock();
        shared.last_error = Some(message);
        self.set_state(&mut shared, ConnectionState::Error);
    }

    /// Starts a connect attempt unless a precondition fails.
    fn begin_connect(inner: &Arc<Self>) {
        if !inner.auth.is_authenticated() {
            warn!("Not authenticated; refusing to connect");
            return;
        }

        let epoch = {
            let mut shared = inner.shared.lock();

            if shared.writer.is_some() || shared.state == ConnectionState::Connecting {
                warn!(state = %shared.state, "Transport already open or opening");
                return;
            }

            shared.last_error = None;
            inner.set_state(&mut shared, ConnectionState::Connecting);
            inner.epoch.load(Ordering::SeqCst)
        };

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            Self::run_connect(inner, epoch).await;
        });
    }

    /// One connect attempt plus, on success, the connection's I/O loop.
    async fn run_connect(inner: Arc<Self>, epoch: u64) {
        let connect_timeout = inner.config.connect_timeout;

        let result = match timeout(connect_timeout, inner.connector.connect()).await {
            Ok(result) => result,
            Err(_) => Err(Error::connection_timeout(connect_timeout.as_millis() as u64)),
        };

        let mut transport = match result {
            Ok(transport) => transport,
            Err(e) => {
                error!(error = %e, "Connect attempt failed");
                inner.mark_error(epoch, format!("connection failed: {e}"));
                Self::handle_closed(&inner, epoch, crate::transport::ABNORMAL_CLOSURE);
                return;
            }
        };

        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        {
            let mut shared = inner.shared.lock();

            // A disconnect/reconnect may have raced the handshake.
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                drop(shared);
                debug!("Connect superseded; closing fresh transport");
                let _ = transport.close(NORMAL_CLOSURE, "superseded").await;
                return;
            }

            shared.writer = Some(writer_tx);
            let policy = inner.config.reconnect.clone();
            shared.reconnect.reset(&policy);
            inner.set_state(&mut shared, ConnectionState::Connected);
        }

        info!("Realtime connection established");
        Self::run_io(inner, epoch, transport, writer_rx).await;
    }

    /// I/O loop for one live transport.
    ///
    /// Returns once the transport closes for any reason; the close code
    /// then drives the retry policy.
    async fn run_io(
        inner: Arc<Self>,
        epoch: u64,
        mut transport: Box<dyn Transport>,
        mut writer_rx: mpsc::UnboundedReceiver<TransportCommand>,
    ) {
        let close_code = loop {
            tokio::select! {
                event = transport.recv() => {
                    match event {
                        Some(Ok(TransportEvent::Text(text))) => {
                            inner.dispatcher.dispatch_frame(&text);
                        }

                        Some(Ok(TransportEvent::Closed { code, reason })) => {
                            debug!(code, reason = %reason, "Transport closed by peer");
                            break code;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "Transport error");
                            inner.mark_error(epoch, format!("transport error: {e}"));
                            break crate::transport::ABNORMAL_CLOSURE;
                        }

                        None => {
                            debug!("Transport stream ended");
                            break crate::transport::ABNORMAL_CLOSURE;
                        }
                    }
                }

                command = writer_rx.recv() => {
                    match command {
                        Some(TransportCommand::Send(text)) => {
                            if let Err(e) = transport.send(text).await {
                                error!(error = %e, "Failed to write frame");
                                inner.mark_error(epoch, format!("transport error: {e}"));
                                break crate::transport::ABNORMAL_CLOSURE;
                            }
                        }

                        Some(TransportCommand::Shutdown { code, reason }) => {
                            debug!(code, reason, "Shutdown command received");
                            let _ = transport.close(code, reason).await;
                            break NORMAL_CLOSURE;
                        }

                        None => {
                            debug!("Writer handle dropped");
                            let _ = transport.close(NORMAL_CLOSURE, "client gone").await;
                            break NORMAL_CLOSURE;
                        }
                    }
                }
            }
        };

        Self::handle_closed(&inner, epoch, close_code);
    }

    /// Post-close bookkeeping and retry scheduling.
    fn handle_closed(inner: &Arc<Self>, epoch: u64, close_code: u16) {
        if inner.epoch.load(Ordering::SeqCst) != epoch {
            // A disconnect/reconnect/shutdown already owns the state.
            debug!("Close superseded; skipping retry logic");
            return;
        }

        let policy = inner.config.reconnect.clone();
        let mut shared = inner.shared.lock();
        shared.writer = None;

        if shared.state != ConnectionState::Error {
            inner.set_state(&mut shared, ConnectionState::Disconnected);
        }

        if close_code == NORMAL_CLOSURE {
            return;
        }

        if !inner.auth.is_authenticated() {
            debug!("Not authenticated after abnormal close; not retrying");
            return;
        }

        match shared.reconnect.next_attempt(&policy) {
            Some(delay) => {
                let attempt = shared.reconnect.attempts;
                info!(
                    attempt,
                    max = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                drop(shared);

                let inner = Arc::clone(inner);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;

                    // The world may have moved on while we slept.
                    if inner.epoch.load(Ordering::SeqCst) != epoch {
                        debug!(attempt, "Scheduled reconnect superseded");
                        return;
                    }
                    if inner.shared.lock().state == ConnectionState::Connected {
                        debug!(attempt, "Already connected; skipping scheduled reconnect");
                        return;
                    }

                    Self::begin_connect(&inner);
                });
            }

            None => {
                let err = Error::reconnect_exhausted(policy.max_attempts);
                error!(attempts = shared.reconnect.attempts, "Giving up on reconnect");
                shared.last_error = Some(err.to_string());
                inner.set_state(&mut shared, ConnectionState::Error);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
