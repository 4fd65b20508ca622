//! Background ingestion of the status feed.
//!
//! ## State machine
//!
//! ```text
//! Disconnected ──▶ Connecting ──▶ Streaming
//!      ▲               │              │
//!      └─── delay ◀────┴──────────────┘   (transient failure)
//!
//! any state ──▶ Stopped                     (close, fatal error)
//! ```
//!
//! Transient failures are connection errors, a silent feed, the server
//! closing the feed, and undecodable frames. Any other [`ApiError`] is fatal:
//! it is recorded and the task ends.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use protocol::{ApiError, StreamId, ZoneStatusFrame, ZoneStatuses};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use transport::SessionAuthenticator;

use crate::config::StatusReceiverConfig;
use crate::stream::{StatusStreamError, ZoneStatusStream};

/// Where the receiver is in its connection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverState {
    Disconnected,
    Connecting,
    Streaming,
    Stopped,
}

type Listener = Box<dyn Fn(&ZoneStatusFrame) + Send + Sync>;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Shared {
    listeners: Mutex<Vec<Listener>>,
    latest: RwLock<Arc<ZoneStatusFrame>>,
    state: watch::Sender<ReceiverState>,
    failure: Mutex<Option<Arc<ApiError>>>,
}

impl Shared {
    fn set_state(&self, state: ReceiverState) {
        self.state.send_replace(state);
    }

    /// Caches `frame`, then hands it to every listener in registration order.
    fn publish(&self, frame: ZoneStatusFrame) {
        let frame = Arc::new(frame);
        *self.latest.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&frame);

        let listeners = self.lock_listeners();
        for (index, listener) in listeners.iter().enumerate() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(&frame))) {
                error!(
                    listener = index,
                    panic = panic_message(payload.as_ref()),
                    "status listener panicked"
                );
            }
        }
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}

// ---------------------------------------------------------------------------
// StatusReceiver
// ---------------------------------------------------------------------------

/// Keeps a connection to the status feed open, caches the latest frame, and
/// fans every frame out to registered listeners.
///
/// Listeners run on the receiver's task while it holds the listener lock, so
/// a listener must not call [`StatusReceiver::add_listener`] and should
/// return quickly. Frame N is fully dispatched before frame N+1 is read.
pub struct StatusReceiver {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StatusReceiver {
    /// Spawns the ingestion task on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(session: Arc<SessionAuthenticator>, config: StatusReceiverConfig) -> Self {
        let (state, _) = watch::channel(ReceiverState::Disconnected);
        let shared = Arc::new(Shared {
            listeners: Mutex::new(Vec::new()),
            latest: RwLock::new(Arc::new(ZoneStatusFrame::new())),
            state,
            failure: Mutex::new(None),
        });
        let (shutdown, stop) = watch::channel(false);

        let task = tokio::spawn(ingest(Arc::clone(&shared), session, config, stop));

        Self {
            shared,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Registers `listener` for every frame received from now on.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&ZoneStatusFrame) + Send + Sync + 'static,
    {
        self.shared.lock_listeners().push(Box::new(listener));
    }

    /// The most recent statuses for `stream_id`; empty if none have arrived.
    pub fn latest(&self, stream_id: StreamId) -> ZoneStatuses {
        self.latest_frame()
            .get(&stream_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The most recent frame; empty before the first one arrives.
    pub fn latest_frame(&self) -> Arc<ZoneStatusFrame> {
        self.shared
            .latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn state(&self) -> ReceiverState {
        *self.shared.state.borrow()
    }

    /// Observes state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ReceiverState> {
        self.shared.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state() != ReceiverState::Stopped
    }

    /// The error that stopped the receiver, if it stopped on its own.
    pub fn failure(&self) -> Option<Arc<ApiError>> {
        self.shared
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Stops the task and waits for it to exit. Safe to call again or from
    /// several callers at once; every call returns only after the task is
    /// gone.
    pub async fn close(&self) {
        self.shutdown.send_replace(true);
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        match task {
            Some(task) => {
                if let Err(e) = task.await {
                    error!(error = %e, "status receiver task did not exit cleanly");
                }
                // The task sets this itself unless it panicked.
                self.shared.set_state(ReceiverState::Stopped);
            }
            None => {
                // Another caller owns the join; wait for it to finish.
                let mut states = self.watch_state();
                let _ = states.wait_for(|state| *state == ReceiverState::Stopped).await;
            }
        }
    }
}

impl Drop for StatusReceiver {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

impl std::fmt::Debug for StatusReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReceiver")
            .field("state", &self.state())
            .field("listeners", &self.shared.lock_listeners().len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Ingestion task
// ---------------------------------------------------------------------------

enum Outcome {
    Reconnect,
    Stop,
    Fatal(ApiError),
}

async fn ingest(
    shared: Arc<Shared>,
    session: Arc<SessionAuthenticator>,
    config: StatusReceiverConfig,
    mut stop: watch::Receiver<bool>,
) {
    info!(path = %config.path, "status receiver started");

    loop {
        if *stop.borrow() {
            break;
        }

        match connect_and_stream(&shared, &session, &config, &mut stop).await {
            Outcome::Reconnect => {}
            Outcome::Stop => break,
            Outcome::Fatal(e) => {
                error!(kind = %e.kind(), error = %e, "status receiver stopped by unrecoverable error");
                *shared.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(e));
                break;
            }
        }

        shared.set_state(ReceiverState::Disconnected);
        tokio::select! {
            _ = stop.changed() => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }

    shared.set_state(ReceiverState::Stopped);
    info!("status receiver stopped");
}

async fn connect_and_stream(
    shared: &Shared,
    session: &SessionAuthenticator,
    config: &StatusReceiverConfig,
    stop: &mut watch::Receiver<bool>,
) -> Outcome {
    shared.set_state(ReceiverState::Connecting);
    let opened = tokio::select! {
        _ = stop.changed() => return Outcome::Stop,
        opened = ZoneStatusStream::open(session, &config.path, Some(config.inter_frame_timeout)) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) if e.is_retryable() => {
            warn!(error = %e, "could not open status feed; retrying");
            return Outcome::Reconnect;
        }
        Err(e) => return Outcome::Fatal(e),
    };

    shared.set_state(ReceiverState::Streaming);
    debug!("status feed open");

    loop {
        let next = tokio::select! {
            _ = stop.changed() => return Outcome::Stop,
            next = stream.next_frame() => next,
        };

        match next {
            Ok(Some(frame)) => shared.publish(frame),
            Ok(None) => {
                warn!("status feed closed by server; reconnecting");
                return Outcome::Reconnect;
            }
            Err(StatusStreamError::Api(e)) if !e.is_retryable() => return Outcome::Fatal(e),
            Err(e) => {
                warn!(error = %e, "status feed interrupted; reconnecting");
                return Outcome::Reconnect;
            }
        }
    }
}
