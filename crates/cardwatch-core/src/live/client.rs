// ── Reconnecting stream client ──
//
// Owns at most one live connection and the single retry timer. A
// background task runs connect → read → wait → reconnect; `disconnect`
// cancels it and joins it, so nothing it owns outlives teardown.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use cardwatch_api::stream::parse_message;
use cardwatch_api::{StreamConnector, WireMessage};
use futures_util::StreamExt;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::dispatch::EventDispatcher;
use super::monitor::{ConnectionMonitor, ConnectionState};
use crate::config::ReconnectPolicy;

/// Reason passed to the error hook when an open connection drops.
pub const CONNECTION_LOST: &str = "Connection lost";
/// Reason passed to the error hook when an attempt never opened.
pub const FAILED_TO_CONNECT: &str = "Failed to connect";

type ConnectHook = dyn Fn() + Send + Sync;
type ErrorHook = dyn Fn(&str) + Send + Sync;

/// Optional callbacks fired from the stream task.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    on_connect: Option<Arc<ConnectHook>>,
    on_error: Option<Arc<ErrorHook>>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called each time a connection opens.
    #[must_use]
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Called on every transport failure with a short reason.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    fn connected(&self) {
        if let Some(f) = &self.on_connect {
            f();
        }
    }

    fn error(&self, reason: &str) {
        if let Some(f) = &self.on_error {
            f(reason);
        }
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

// ── StreamClient ─────────────────────────────────────────────────────

/// Reconnecting client for the server-push event stream.
pub struct StreamClient {
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

/// State the background task needs.
struct Shared {
    connector: Arc<dyn StreamConnector>,
    dispatcher: Arc<EventDispatcher>,
    monitor: ConnectionMonitor,
    policy: ReconnectPolicy,
    hooks: LifecycleHooks,
    /// Delay of the retry timer currently pending, if any.
    pending_retry: watch::Sender<Option<Duration>>,
    /// Wakes a pending retry wait early.
    wake: Notify,
}

/// One running background task.
struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl StreamClient {
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        dispatcher: Arc<EventDispatcher>,
        monitor: ConnectionMonitor,
        policy: ReconnectPolicy,
        hooks: LifecycleHooks,
    ) -> Self {
        let (pending_retry, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                connector,
                dispatcher,
                monitor,
                policy,
                hooks,
                pending_retry,
                wake: Notify::new(),
            }),
            session: Mutex::new(None),
        }
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.shared.monitor
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.shared.dispatcher
    }

    /// Delay of the pending retry timer, or `None` if no retry is scheduled.
    pub fn pending_retry(&self) -> Option<Duration> {
        *self.shared.pending_retry.borrow()
    }

    /// Whether the background task is running.
    pub async fn is_active(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start the connection task.
    ///
    /// Does nothing while a connection is open or being opened. While a
    /// retry is pending, the timer is cut short and the next attempt
    /// starts at once.
    pub async fn connect(&self) {
        let mut session = self.session.lock().await;

        if session.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            if self.pending_retry().is_some() {
                debug!("connect requested during retry wait, skipping timer");
                self.shared.wake.notify_waiters();
            }
            return;
        }

        let cancel = CancellationToken::new();
        self.shared.monitor.set_state(ConnectionState::Connecting);

        let shared = Arc::clone(&self.shared);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            stream_loop(shared, task_cancel).await;
        });

        *session = Some(Session { cancel, handle });
    }

    /// Close the connection and cancel any pending retry.
    ///
    /// Waits for the background task to exit: once this returns no
    /// callback fires and no timer remains. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.cancel.cancel();
            if let Err(e) = session.handle.await {
                warn!(error = %e, "stream task ended abnormally");
            }
            debug!("event stream disconnected");
        }

        self.shared.pending_retry.send_replace(None);
        self.shared.monitor.set_state(ConnectionState::Disconnected);
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
        }
    }
}

// ── Background loop ──────────────────────────────────────────────────

/// How a single connection attempt ended.
enum Outcome {
    /// The attempt never produced an open stream.
    NeverOpened(cardwatch_api::Error),
    /// The stream opened and later dropped.
    Dropped(cardwatch_api::Error),
}

/// Main loop: connect → read → on failure, wait → reconnect.
async fn stream_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    // Once any attempt in this session has opened, later failures are
    // reconnects, even if the re-open itself is refused.
    let mut ever_opened = false;

    loop {
        shared.monitor.set_state(ConnectionState::Connecting);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = run_connection(&shared) => outcome,
        };

        let error = match outcome {
            Outcome::Dropped(e) => {
                ever_opened = true;
                e
            }
            Outcome::NeverOpened(e) => e,
        };
        let reason = if ever_opened {
            CONNECTION_LOST
        } else {
            FAILED_TO_CONNECT
        };
        let delay = shared.policy.delay_for(ever_opened);

        shared.monitor.set_state(ConnectionState::Disconnected);
        warn!(error = %error, reason, "event stream failed");
        shared.hooks.error(reason);

        // Register for an early wake before announcing the timer, so a
        // `connect` that observes it is guaranteed to reach this waiter.
        let mut woken = pin!(shared.wake.notified());
        woken.as_mut().enable();
        shared.pending_retry.send_replace(Some(delay));
        info!(delay_ms = delay.as_millis(), "retrying event stream");

        let cancelled = tokio::select! {
            biased;
            () = cancel.cancelled() => true,
            () = tokio::time::sleep(delay) => false,
            () = woken => false,
        };
        shared.pending_retry.send_replace(None);

        if cancelled {
            break;
        }
    }

    debug!("event stream loop exiting");
}

/// Open one connection and read it until it fails.
async fn run_connection(shared: &Shared) -> Outcome {
    let mut messages = match shared.connector.connect().await {
        Ok(messages) => messages,
        Err(e) => return Outcome::NeverOpened(e),
    };

    info!("event stream connected");
    shared.monitor.on_open();
    shared.hooks.connected();

    loop {
        match messages.next().await {
            Some(Ok(msg)) => handle_message(shared, &msg),
            Some(Err(e)) => return Outcome::Dropped(e),
            None => {
                return Outcome::Dropped(cardwatch_api::Error::StreamClosed(
                    "server ended the stream".into(),
                ));
            }
        }
    }
}

/// Decode one message and apply it. Runs to completion before the next
/// message is read.
fn handle_message(shared: &Shared, msg: &WireMessage) {
    match parse_message(msg) {
        Ok(Some(event)) => {
            trace!(event = event.name(), "stream event");
            shared.monitor.on_event(&event);
            shared.dispatcher.dispatch(&event);
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "dropping malformed stream message"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
