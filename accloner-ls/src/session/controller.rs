//! Learning session controller
//!
//! Owns the transmitter listener, the single transmitter slot, the shared
//! selection, the observer registry, and the capture persist queue. One
//! controller is one learning session; nothing here is process-global, so
//! several sessions can coexist in one process (ephemeral ports in tests,
//! for instance).
//!
//! Lifecycle: construction starts the catalog store connection in the
//! background. The controller becomes ready exactly once, when that
//! connection succeeds. A listen request made before readiness is parked
//! and honored on the ready transition, so the listener binds exactly once.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use accloner_common::catalog::AcModel;
use accloner_common::events::{CaptureEvent, TransmitterStatus};
use accloner_common::observer::SubscriberId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::CatalogStore;
use crate::error::{Error, Result};
use crate::session::observers::SessionObservers;
use crate::session::selection::SelectionState;

/// Acknowledgement byte written after a frame was merged and queued for
/// persistence
const ACK_CAPTURED: u8 = b'1';
/// Acknowledgement byte written when the frame was discarded because the
/// selection was incomplete
const ACK_DISCARDED: u8 = b'0';

const READ_BUFFER_SIZE: usize = 4096;

/// Controller for one signal learning session
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: Config,
    /// Populated once the background store connection succeeds
    store: RwLock<Option<CatalogStore>>,
    /// One-way flag: flips to true on store connection, never back
    ready: AtomicBool,
    /// Set when a listen request arrived before readiness
    listen_pending: Mutex<bool>,
    selection: SelectionState,
    observers: SessionObservers,
    /// Capture snapshots queued for the persister task, in capture order
    persist_tx: mpsc::UnboundedSender<AcModel>,
    transmitter: Mutex<Option<TransmitterSlot>>,
    listener: Mutex<Option<ListenerHandle>>,
}

/// The single admitted transmitter connection
struct TransmitterSlot {
    peer: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
}

struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

enum FrameRead {
    Payload(usize),
    Closed,
    IdleTimeout,
    Failed(std::io::Error),
}

impl SessionController {
    /// Creates a controller and starts connecting to the catalog store
    ///
    /// Must be called from within a Tokio runtime; the store connection
    /// runs as a background task.
    pub fn new(config: Config) -> Self {
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ControllerInner {
            config,
            store: RwLock::new(None),
            ready: AtomicBool::new(false),
            listen_pending: Mutex::new(false),
            selection: SelectionState::new(),
            observers: SessionObservers::new(),
            persist_tx,
            transmitter: Mutex::new(None),
            listener: Mutex::new(None),
        });

        let connecting = Arc::clone(&inner);
        tokio::spawn(async move {
            connecting.connect_store(persist_rx).await;
        });

        Self { inner }
    }

    /// True once the catalog store connection has succeeded
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// True while the transmitter listener is bound and accepting
    pub async fn is_listening(&self) -> bool {
        self.inner.listener.lock().await.is_some()
    }

    /// Local address of the listener, once bound
    ///
    /// Useful when the configured port is 0 (ephemeral).
    pub async fn listen_addr(&self) -> Option<SocketAddr> {
        self.inner
            .listener
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.local_addr)
    }

    /// Remote address of the connected transmitter, if any
    pub async fn transmitter_peer(&self) -> Option<SocketAddr> {
        self.inner
            .transmitter
            .lock()
            .await
            .as_ref()
            .map(|slot| slot.peer)
    }

    /// Opens the transmitter listener
    ///
    /// When the controller is not ready yet the request is parked and the
    /// listener is opened on the ready transition instead; the bind happens
    /// exactly once either way. Requesting again while already listening is
    /// a no-op.
    pub async fn start_listening(&self) -> Result<()> {
        let mut pending = self.inner.listen_pending.lock().await;
        if self.inner.ready.load(Ordering::Acquire) {
            drop(pending);
            self.inner.open_listener().await
        } else {
            *pending = true;
            info!("Catalog store not connected yet; listen deferred until ready");
            Ok(())
        }
    }

    /// Shuts the session's listening side down
    ///
    /// Closes the transmitter connection gracefully when one is attached,
    /// closes the listener, and always notifies listening observers with
    /// `false`, whether or not anything was open.
    pub async fn stop_listening(&self) {
        if let Some(slot) = self.inner.transmitter.lock().await.as_ref() {
            debug!("Asking transmitter {} to disconnect", slot.peer);
            let _ = slot.shutdown_tx.try_send(());
        }

        let handle = self.inner.listener.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.shutdown_tx.try_send(());
            let _ = handle.task.await;
            info!("Stopped listening on {}", handle.local_addr);
        }

        self.inner.observers.notify_listening(false);
    }

    /// Registers a readiness callback
    ///
    /// With `force` set and the controller already ready, the callback runs
    /// inline and no token is returned. Otherwise the callback joins the
    /// one-shot ready list, which fires and drains on the ready transition;
    /// a non-`force` registration made after that transition never fires.
    pub fn on_ready(
        &self,
        force: bool,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Option<SubscriberId> {
        if force && self.is_ready() {
            callback();
            return None;
        }
        Some(self.inner.observers.on_ready(callback))
    }

    /// Registers a listening-state callback
    pub fn on_listening(&self, callback: impl Fn(bool) + Send + Sync + 'static) -> SubscriberId {
        self.inner.observers.on_listening(callback)
    }

    /// Registers a transmitter lifecycle callback
    ///
    /// With `immediate` set and a transmitter currently attached, the
    /// callback first runs inline with the present connection state, then
    /// joins the list like any other registration.
    pub async fn on_transmitter(
        &self,
        immediate: bool,
        callback: impl Fn(&TransmitterStatus) + Send + Sync + 'static,
    ) -> SubscriberId {
        if immediate {
            if let Some(slot) = self.inner.transmitter.lock().await.as_ref() {
                callback(&TransmitterStatus::attached(slot.peer));
            }
        }
        self.inner.observers.on_transmitter(callback)
    }

    /// Registers a signal-captured callback
    pub fn on_capture(
        &self,
        callback: impl Fn(&CaptureEvent) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.inner.observers.on_capture(callback)
    }

    pub fn remove_ready(&self, id: SubscriberId) -> bool {
        self.inner.observers.remove_ready(id)
    }

    pub fn remove_listening(&self, id: SubscriberId) -> bool {
        self.inner.observers.remove_listening(id)
    }

    pub fn remove_transmitter(&self, id: SubscriberId) -> bool {
        self.inner.observers.remove_transmitter(id)
    }

    pub fn remove_capture(&self, id: SubscriberId) -> bool {
        self.inner.observers.remove_capture(id)
    }

    /// Sets the operating mode for subsequent captures
    pub async fn set_mode(&self, mode: i64) {
        self.inner.selection.set_mode(mode).await;
    }

    /// Sets the output temperature for subsequent captures
    pub async fn set_temperature(&self, temperature: i64) {
        self.inner.selection.set_temperature(temperature).await;
    }

    /// Selects a model by identifier
    ///
    /// Returns the model when found. A miss leaves the current selection
    /// untouched, as does a store fault.
    pub async fn select_model_by_id(&self, id: &str) -> Result<Option<AcModel>> {
        let store = self.inner.require_store().await?;
        let found = store.find_by_id(id).await?;
        if let Some(model) = &found {
            info!("Selected model '{}' by id", model.name);
            self.inner.selection.set_model(Some(model.clone())).await;
        }
        Ok(found)
    }

    /// Selects a model by name (normalized before lookup)
    pub async fn select_model_by_name(&self, name: &str) -> Result<Option<AcModel>> {
        let store = self.inner.require_store().await?;
        let found = store.find_by_name(name).await?;
        if let Some(model) = &found {
            info!("Selected model '{}' by name", model.name);
            self.inner.selection.set_model(Some(model.clone())).await;
        }
        Ok(found)
    }

    /// Creates a new model, optionally selecting it
    pub async fn create_model(&self, name: &str, select: bool) -> Result<AcModel> {
        let store = self.inner.require_store().await?;
        let model = store.create(name).await?;
        if select {
            self.inner.selection.set_model(Some(model.clone())).await;
        }
        Ok(model)
    }

    /// Persists the currently selected model
    ///
    /// Fails when nothing is selected.
    pub async fn save_current_model(&self) -> Result<AcModel> {
        let model = self
            .inner
            .selection
            .current_model()
            .await
            .ok_or_else(|| Error::InvalidState("no model selected".to_string()))?;

        let store = self.inner.require_store().await?;
        store.save(&model).await?;
        info!("Saved model '{}'", model.name);
        Ok(model)
    }

    /// Clone of the currently selected model, if any
    pub async fn current_model(&self) -> Option<AcModel> {
        self.inner.selection.current_model().await
    }

    /// Every model known to the catalog, ordered by name
    pub async fn list_models(&self) -> Result<Vec<AcModel>> {
        let store = self.inner.require_store().await?;
        store.list_all().await
    }
}

impl ControllerInner {
    async fn connect_store(self: Arc<Self>, persist_rx: mpsc::UnboundedReceiver<AcModel>) {
        match CatalogStore::connect(&self.config.database_url).await {
            Ok(store) => {
                *self.store.write().await = Some(store.clone());
                tokio::spawn(persist_captures(store, persist_rx));
                self.ready.store(true, Ordering::Release);
                info!("Catalog store connected; session is ready");

                let pending = std::mem::take(&mut *self.listen_pending.lock().await);
                if pending {
                    if let Err(e) = self.open_listener().await {
                        error!("Deferred listen failed: {}", e);
                    }
                }

                self.observers.fire_ready();
            }
            Err(e) => {
                error!("Failed to connect catalog store: {}", e);
            }
        }
    }

    async fn require_store(&self) -> Result<CatalogStore> {
        self.store
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::InvalidState("catalog store not connected yet".to_string()))
    }

    async fn open_listener(self: &Arc<Self>) -> Result<()> {
        let mut guard = self.listener.lock().await;
        if guard.is_some() {
            debug!("Listener already open; ignoring duplicate listen request");
            return Ok(());
        }

        let listener =
            TcpListener::bind((self.config.bind.as_str(), self.config.port)).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let accepting = Arc::clone(self);
        let task = tokio::spawn(async move {
            accepting.accept_loop(listener, shutdown_rx).await;
        });

        *guard = Some(ListenerHandle {
            local_addr,
            shutdown_tx,
            task,
        });
        drop(guard);

        info!("Listening for transmitter on {}", local_addr);
        self.observers.notify_listening(true);
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, mut shutdown_rx: mpsc::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Accept loop shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.admit_connection(stream, peer).await,
                    Err(e) => warn!("Failed to accept connection: {}", e),
                }
            }
        }
    }

    /// Fills the transmitter slot or destroys the surplus connection
    async fn admit_connection(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let mut slot = self.transmitter.lock().await;
        if let Some(current) = slot.as_ref() {
            debug!(
                "Rejecting transmitter {}; slot held by {}",
                peer, current.peer
            );
            drop(stream);
            return;
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        *slot = Some(TransmitterSlot { peer, shutdown_tx });
        drop(slot);

        info!("Transmitter connected from {}", peer);
        self.observers
            .notify_transmitter(&TransmitterStatus::attached(peer));

        let serving = Arc::clone(self);
        tokio::spawn(async move {
            serving.transmitter_loop(stream, peer, shutdown_rx).await;
        });
    }

    /// Serves the admitted transmitter until it disconnects, errors, idles
    /// out, or the session shuts its listening side down
    async fn transmitter_loop(
        self: Arc<Self>,
        mut stream: TcpStream,
        peer: SocketAddr,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let idle_timeout = self.config.idle_timeout;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    let _ = stream.shutdown().await;
                    break;
                }
                frame = next_frame(&mut stream, &mut buf, idle_timeout) => match frame {
                    FrameRead::Payload(len) => {
                        let ack = self.handle_frame(&buf[..len]).await;
                        if let Err(e) = stream.write_all(&[ack]).await {
                            warn!("Failed to acknowledge frame from {}: {}", peer, e);
                            break;
                        }
                    }
                    FrameRead::Closed => {
                        debug!("Transmitter {} closed the connection", peer);
                        break;
                    }
                    FrameRead::IdleTimeout => {
                        info!("Transmitter {} idle; disconnecting", peer);
                        let _ = stream.shutdown().await;
                        break;
                    }
                    FrameRead::Failed(e) => {
                        warn!("Read error from transmitter {}: {}", peer, e);
                        break;
                    }
                }
            }
        }

        // Only this task ever clears the slot it occupies
        *self.transmitter.lock().await = None;
        info!("Transmitter disconnected: {}", peer);
        self.observers
            .notify_transmitter(&TransmitterStatus::detached(peer));
    }

    /// Runs the capture path for one received frame and picks the ack byte
    async fn handle_frame(&self, payload: &[u8]) -> u8 {
        let encoded_signal = String::from_utf8_lossy(payload).into_owned();
        debug!("Received {} byte frame", payload.len());

        match self.selection.apply_capture(&encoded_signal).await {
            Some((snapshot, event)) => {
                // The ack never waits for the database; the persister task
                // commits queued snapshots in capture order
                if let Err(unsent) = self.persist_tx.send(snapshot) {
                    error!(
                        "Capture for '{}' applied but catalog store is unavailable",
                        unsent.0.name
                    );
                }

                self.observers.notify_capture(&event);
                ACK_CAPTURED
            }
            None => {
                debug!("Selection incomplete; frame discarded");
                ACK_DISCARDED
            }
        }
    }
}

/// Writes queued capture snapshots to the catalog one at a time, in
/// capture order. Runs until the controller is dropped and the queue
/// closes.
async fn persist_captures(store: CatalogStore, mut queue: mpsc::UnboundedReceiver<AcModel>) {
    while let Some(snapshot) = queue.recv().await {
        if let Err(e) = store.save(&snapshot).await {
            error!("Failed to persist capture for '{}': {}", snapshot.name, e);
        }
    }
}

async fn next_frame(
    stream: &mut TcpStream,
    buf: &mut [u8],
    idle_timeout: Option<Duration>,
) -> FrameRead {
    let read = stream.read(buf);
    let result = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, read).await {
            Ok(result) => result,
            Err(_) => return FrameRead::IdleTimeout,
        },
        None => read.await,
    };

    match result {
        Ok(0) => FrameRead::Closed,
        Ok(len) => FrameRead::Payload(len),
        Err(e) => FrameRead::Failed(e),
    }
}
