//! Client network facade
//!
//! [`NetworkClient`] owns one TCP connection to the game server. A writer
//! task drains outgoing lines; a reader task decodes incoming lines, settles
//! outstanding color/canvas requests and then hands every message to the
//! registered observers.
//!
//! Color and canvas requests carry a request id, so replies are matched to
//! the call that is waiting for them even when several are in flight.

use crate::error::ClientError;
use crate::observer::NetworkObserver;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use shared::{
    CanvasId, CanvasRequest, Color, ColorRequest, DrawEvent, Grant, Header, LobbyJoin,
    LobbyReady, Message, RequestId, ScoreReport,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// How long a color or canvas request waits for the server before it is
/// treated as refused.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub response_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

struct PendingRequest {
    header: Header,
    done: oneshot::Sender<bool>,
}

type PendingMap = HashMap<RequestId, PendingRequest>;

/// State shared with the reader task.
struct Shared {
    observers: RwLock<Vec<Arc<dyn NetworkObserver>>>,
    pending: Mutex<PendingMap>,
    connected: AtomicBool,
}

impl Shared {
    /// Hands a grant to the request waiting for it. A reply without an id
    /// goes to the oldest outstanding request of the same kind.
    fn settle(&self, header: Header, grant: Grant) {
        let mut pending = self.pending.lock();

        let request_id = grant.request_id.or_else(|| {
            pending
                .iter()
                .filter(|(_, request)| request.header == header)
                .map(|(id, _)| *id)
                .min()
        });
        let Some(request_id) = request_id else {
            debug!("Unsolicited {} reply: {:?}", header, grant);
            return;
        };

        match pending.get(&request_id).map(|request| request.header) {
            Some(pending_header) if pending_header == header => {
                if let Some(request) = pending.remove(&request_id) {
                    // The caller may have timed out already.
                    let _ = request.done.send(grant.granted);
                }
            }
            Some(pending_header) => {
                warn!(
                    "{} reply for pending {} request #{}, ignoring it",
                    header, pending_header, request_id
                );
            }
            None => debug!("Late {} reply: {:?}", header, grant),
        }
    }

    /// Observers may register or remove observers from their callbacks, so
    /// the list is not locked while they run.
    fn observers(&self) -> Vec<Arc<dyn NetworkObserver>> {
        self.observers.read().clone()
    }

    fn notify(&self, message: &Message) {
        for observer in self.observers() {
            observer.message_received(message);
        }
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the senders wakes every waiter with an error.
        self.pending.lock().clear();
        for observer in self.observers() {
            observer.connection_closed();
        }
    }
}

/// What the local player currently holds.
#[derive(Debug, Default)]
struct ClientState {
    color: Option<Color>,
    current_canvas: Option<CanvasId>,
    running: bool,
    /// Next stroke point starts a new path
    first_draw: bool,
}

pub struct NetworkClient {
    tx: mpsc::UnboundedSender<String>,
    shared: Arc<Shared>,
    state: Mutex<ClientState>,
    next_request_id: AtomicU64,
    config: ClientConfig,
    local_addr: SocketAddr,
}

impl NetworkClient {
    /// Connects and spawns the reader and writer tasks.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let local_addr = stream.local_addr()?;
        info!("Connected to {} from {}", stream.peer_addr()?, local_addr);

        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            observers: RwLock::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
        });

        tokio::spawn(write_lines(writer, rx));
        tokio::spawn(read_lines(reader, Arc::clone(&shared)));

        Ok(Self {
            tx,
            shared,
            state: Mutex::new(ClientState::default()),
            next_request_id: AtomicU64::new(1),
            config,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Registers an observer. Observers are notified in registration order.
    pub fn add_observer(&self, observer: Arc<dyn NetworkObserver>) {
        self.shared.observers.write().push(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn NetworkObserver>) {
        self.shared
            .observers
            .write()
            .retain(|existing| !Arc::ptr_eq(existing, observer));
    }

    pub fn color(&self) -> Option<Color> {
        self.state.lock().color
    }

    pub fn current_canvas(&self) -> Option<CanvasId> {
        self.state.lock().current_canvas
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn send(&self, message: &Message) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::Disconnected);
        }
        debug!("-> {}", message);
        self.tx
            .send(message.to_line())
            .map_err(|_| ClientError::Disconnected)
    }

    /// Sends a correlated request and waits for its grant. Running out of
    /// time counts as a refusal.
    async fn request(
        &self,
        header: Header,
        message: impl FnOnce(RequestId) -> Message,
    ) -> Result<bool, ClientError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (done, response) = oneshot::channel();
        self.shared
            .pending
            .lock()
            .insert(request_id, PendingRequest { header, done });

        if let Err(e) = self.send(&message(request_id)) {
            self.shared.pending.lock().remove(&request_id);
            return Err(e);
        }

        match timeout(self.config.response_timeout, response).await {
            Ok(Ok(granted)) => Ok(granted),
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Err(_) => {
                self.shared.pending.lock().remove(&request_id);
                warn!("{} #{} timed out", header, request_id);
                Ok(false)
            }
        }
    }

    /// Asks the server for exclusive use of `color`. On success this client
    /// draws and scores with it from now on.
    pub async fn register_color(&self, color: Color) -> Result<bool, ClientError> {
        let granted = self
            .request(Header::ColorRequest, |request_id| {
                ColorRequest {
                    color_hash: color.hash_code(),
                    request_id: Some(request_id),
                }
                .to_message()
            })
            .await?;

        if granted {
            self.state.lock().color = Some(color);
        }
        Ok(granted)
    }

    /// Enables the canvas, drawing and scoring operations. Requires a
    /// registered color.
    pub fn start_client(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        if state.color.is_none() {
            return Err(ClientError::IllegalState(
                "Attempting to start the client without registering a color",
            ));
        }
        state.running = true;
        Ok(())
    }

    /// Claims a canvas for drawing. Only one client may draw on a canvas at
    /// a time, and locked canvases can never be claimed.
    pub async fn select_canvas_for_drawing(
        &self,
        canvas_id: CanvasId,
    ) -> Result<bool, ClientError> {
        if !self.is_running() {
            return Err(ClientError::IllegalState(
                "Attempting to select canvas without a running client",
            ));
        }

        let granted = self
            .request(Header::CanvasRequest, |request_id| {
                CanvasRequest {
                    canvas_id,
                    request_id: Some(request_id),
                }
                .to_message()
            })
            .await?;

        if granted {
            let mut state = self.state.lock();
            state.current_canvas = Some(canvas_id);
            state.first_draw = true;
        }
        Ok(granted)
    }

    pub fn release_canvas(&self) -> Result<(), ClientError> {
        if !self.is_running() {
            return Err(ClientError::IllegalState(
                "Attempting to release canvas without a running client",
            ));
        }
        self.send(&Message::empty(Header::CanvasRelease))?;
        self.state.lock().current_canvas = None;
        Ok(())
    }

    /// Returns the color and canvas for an operation on the current canvas.
    fn drawing_target(
        &self,
        not_running: &'static str,
        no_color: &'static str,
        no_canvas: &'static str,
    ) -> Result<(Color, CanvasId), ClientError> {
        let state = self.state.lock();
        if !state.running {
            return Err(ClientError::IllegalState(not_running));
        }
        let color = state.color.ok_or(ClientError::IllegalState(no_color))?;
        let canvas_id = state
            .current_canvas
            .ok_or(ClientError::IllegalState(no_canvas))?;
        Ok((color, canvas_id))
    }

    /// Sends one stroke point on the current canvas in the registered color.
    pub fn send_drawing(&self, x: f64, y: f64) -> Result<(), ClientError> {
        let (color, canvas_id) = self.drawing_target(
            "Attempting to draw without a running client",
            "Attempting to draw without registering a color",
            "Attempting to draw without registering a canvas",
        )?;

        let path_start = std::mem::take(&mut self.state.lock().first_draw);
        let event = DrawEvent::stroke(x, y, canvas_id, color, path_start);
        self.send(&event.to_message()?)
    }

    /// Marks the current canvas as finished for everyone.
    pub fn send_lock_canvas(&self) -> Result<(), ClientError> {
        let (_, canvas_id) = self.drawing_target(
            "Attempting to lock canvas without a running client",
            "Attempting to lock canvas without registering a color",
            "Attempting to lock canvas without registering a canvas",
        )?;
        self.send(&Message::new(Header::CanvasLock, canvas_id.to_string()))
    }

    pub fn send_clear_canvas(&self) -> Result<(), ClientError> {
        let (_, canvas_id) = self.drawing_target(
            "Attempting to clear canvas without a running client",
            "Attempting to clear canvas without registering a color",
            "Attempting to clear canvas without registering a canvas",
        )?;
        self.send(&Message::new(Header::CanvasClear, canvas_id.to_string()))
    }

    /// Announces that the current canvas now belongs to this client's color.
    pub fn send_own_canvas(&self) -> Result<(), ClientError> {
        let (color, canvas_id) = self.drawing_target(
            "Attempting to own canvas without a running client",
            "Attempting to own canvas without registering a color",
            "Attempting to own canvas without registering a canvas",
        )?;
        self.send(&shared::CanvasOwn { canvas_id, color }.to_message())
    }

    pub fn send_score(&self, score: u32) -> Result<(), ClientError> {
        let color = {
            let state = self.state.lock();
            if !state.running {
                return Err(ClientError::IllegalState(
                    "Attempting to send score without a running client",
                ));
            }
            state.color.ok_or(ClientError::IllegalState(
                "Attempting to send score without registering a color",
            ))?
        };
        self.send(&ScoreReport { score, color }.to_message())
    }

    /// Enters the lobby under `name` with the registered color.
    pub fn join_lobby(&self, name: &str) -> Result<(), ClientError> {
        let color = self.color().ok_or(ClientError::IllegalState(
            "Attempting to join the lobby without registering a color",
        ))?;
        self.send(
            &LobbyJoin {
                color,
                name: name.to_string(),
            }
            .to_message(),
        )
    }

    pub fn set_ready(&self, ready: bool) -> Result<(), ClientError> {
        let color = self.color().ok_or(ClientError::IllegalState(
            "Attempting to set ready without registering a color",
        ))?;
        self.send(&LobbyReady { color, ready }.to_message())
    }
}

async fn write_lines(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!("Failed to send to server: {}", e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_lines(reader: OwnedReadHalf, shared: Arc<Shared>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                info!("Server closed the connection");
                break;
            }
            Ok(_) => {
                let line = match std::str::from_utf8(&buf) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Skipping line from server that is not UTF-8: {}", e);
                        continue;
                    }
                };
                let message = match Message::decode(line) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Skipping undecodable line from server: {}", e);
                        continue;
                    }
                };
                debug!("<- {}", message);

                if matches!(message.header, Header::ColorRequest | Header::CanvasRequest) {
                    match Grant::parse(message.header, &message.data) {
                        Ok(grant) => shared.settle(message.header, grant),
                        Err(e) => warn!("Bad reply from server: {}", e),
                    }
                }
                if message.header == Header::Error {
                    warn!("Server rejected this client: {}", message.data);
                }

                shared.notify(&message);
            }
            Err(e) => {
                error!("Error reading from server: {}", e);
                break;
            }
        }
    }

    shared.close();
}
