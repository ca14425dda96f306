//! Process-wide shared state for one game session
//!
//! The store owns the client registry, the board (colors, canvases, scores)
//! and the lobby behind a single lock. Every public method is one complete
//! transaction: callers never hold the lock across calls, and notifications
//! that must be ordered relative to a state change are queued while the
//! lock is still held.

use crate::client_manager::{ClientId, ClientManager};
use crate::error::SessionError;
use crate::game::GameState;
use crate::lobby::{Lobby, LobbyPlayer};
use log::{debug, info};
use shared::{
    lobby_left_message, CanvasId, Color, DrawEvent, GameResults, Header, LobbyJoin, LobbyReady,
    Message, ScoreReport, DEFAULT_BOARD_SIZE,
};
use std::net::SocketAddr;
use tokio::sync::{mpsc, watch, RwLock};

/// Whether the server is gathering players or playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    InGame,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of canvases on the board
    pub board_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            board_size: DEFAULT_BOARD_SIZE,
        }
    }
}

struct SessionState {
    clients: ClientManager,
    game: GameState,
    lobby: Lobby,
}

impl SessionState {
    /// Broadcasts the start countdown the first time the whole lobby is ready.
    fn start_if_all_ready(&mut self, phase: &watch::Sender<Phase>) -> bool {
        if !self.lobby.check_all_ready() {
            return false;
        }

        info!(
            "All {} lobby players ready, starting countdown",
            self.lobby.len()
        );
        self.clients
            .broadcast(&Message::empty(Header::LobbyStartCountdown));
        phase.send_replace(Phase::InGame);
        true
    }
}

pub struct SessionStore {
    state: RwLock<SessionState>,
    phase: watch::Sender<Phase>,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        let (phase, _) = watch::channel(Phase::Lobby);
        Self {
            state: RwLock::new(SessionState {
                clients: ClientManager::new(),
                game: GameState::new(config.board_size),
                lobby: Lobby::new(),
            }),
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub async fn board_size(&self) -> usize {
        self.state.read().await.game.board_size()
    }

    pub async fn client_count(&self) -> usize {
        self.state.read().await.clients.len()
    }

    pub async fn lobby_players(&self) -> Vec<LobbyPlayer> {
        self.state.read().await.lobby.players().cloned().collect()
    }

    pub async fn connect(
        &self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<String>,
    ) -> ClientId {
        self.state.write().await.clients.add_client(addr, sender)
    }

    /// Cleans up after a client: frees its color and canvas, announces its
    /// departure from the lobby, and re-checks readiness. When the last
    /// client leaves, the whole session resets. Returns true on reset.
    pub async fn disconnect(&self, client_id: ClientId) -> bool {
        let mut state = self.state.write().await;

        state.clients.remove_client(client_id);
        state.game.remove_client(&client_id);

        if let Some(player) = state.lobby.remove_player(client_id) {
            let message = lobby_left_message(player.color);
            state.lobby.record(message.clone());
            state.clients.broadcast(&message);
            info!("Lobby player {} ({}) left", player.name, player.color);
        }

        if state.clients.is_empty() {
            state.game.reset();
            state.lobby.reset();
            self.phase.send_replace(Phase::Lobby);
            info!("Last client disconnected, session reset");
            return true;
        }

        state.start_if_all_ready(&self.phase);
        false
    }

    pub async fn register_color(&self, client_id: ClientId, color_hash: u32) -> bool {
        self.state
            .write()
            .await
            .game
            .register_color(client_id, color_hash)
    }

    pub async fn acquire_canvas(&self, client_id: ClientId, canvas_id: CanvasId) -> bool {
        self.state
            .write()
            .await
            .game
            .acquire_canvas(client_id, canvas_id)
    }

    pub async fn release_canvas(&self, client_id: ClientId) {
        self.state.write().await.game.release_canvas(client_id);
    }

    pub async fn lock_canvas(&self, canvas_id: CanvasId) -> Result<(), SessionError> {
        self.state.write().await.game.lock_canvas(canvas_id)
    }

    pub async fn ensure_canvas_in_range(&self, canvas_id: CanvasId) -> Result<(), SessionError> {
        self.state.read().await.game.ensure_canvas_in_range(canvas_id)
    }

    /// Stores a score and reports whether every canvas is locked.
    pub async fn set_score(&self, color: Color, score: u32) -> bool {
        self.state.write().await.game.set_score(color, score)
    }

    pub async fn winner(&self) -> Result<GameResults, SessionError> {
        self.state.read().await.game.winner()
    }

    pub async fn check_valid_ownership(&self, client_id: ClientId, canvas_id: CanvasId) -> bool {
        self.state
            .read()
            .await
            .game
            .check_valid_ownership(client_id, canvas_id)
    }

    pub async fn check_valid_color(&self, client_id: ClientId, color_hash: u32) -> bool {
        self.state
            .read()
            .await
            .game
            .check_valid_color(client_id, color_hash)
    }

    pub async fn color_of(&self, client_id: ClientId) -> Option<Color> {
        self.state.read().await.game.color_of(client_id)
    }

    pub async fn send_to(&self, client_id: ClientId, message: &Message) -> bool {
        self.state.read().await.clients.send_to(client_id, message)
    }

    pub async fn broadcast(&self, message: &Message) {
        self.state.read().await.clients.broadcast(message);
    }

    pub async fn broadcast_excluding(&self, message: &Message, exclude: &[ClientId]) {
        self.state
            .read()
            .await
            .clients
            .broadcast_excluding(message, exclude);
    }

    /// Relays a draw event to every other client, provided the sender owns
    /// the canvas and draws with its registered color. The check and the
    /// relay happen under one lock so ownership cannot change in between.
    pub async fn relay_draw(
        &self,
        client_id: ClientId,
        event: &DrawEvent,
        message: &Message,
    ) -> Result<(), SessionError> {
        let state = self.state.read().await;

        if !state.game.check_valid_ownership(client_id, event.canvas_id) {
            return Err(SessionError::IllegalState(format!(
                "drawing on canvas {} which is not held by the client",
                event.canvas_id
            )));
        }
        if !state
            .game
            .check_valid_color(client_id, event.color.hash_code())
        {
            return Err(SessionError::IllegalState(format!(
                "drawing with unregistered color {}",
                event.color
            )));
        }

        state.clients.broadcast_excluding(message, &[client_id]);
        Ok(())
    }

    /// Stores a reported score. Once the board is full, resolves the winner
    /// and broadcasts the results. Returns whether results were broadcast.
    pub async fn report_score(&self, report: ScoreReport) -> Result<bool, SessionError> {
        let mut state = self.state.write().await;

        if !state.game.set_score(report.color, report.score) {
            debug!("Score {} recorded for {}", report.score, report.color);
            return Ok(false);
        }

        let results = state.game.winner()?;
        info!("Board full, results: {}", results.to_message());
        state.clients.broadcast(&results.to_message());
        Ok(true)
    }

    /// Adds a client to the lobby.
    ///
    /// Delivery order is fixed: the joiner first gets its own join echo, then
    /// the history of earlier lobby events; only then is the join recorded
    /// and broadcast to everyone else. Holding the lock throughout means no
    /// concurrent lobby event can slip between the history snapshot and the
    /// broadcast.
    pub async fn lobby_join(&self, client_id: ClientId, join: LobbyJoin) {
        let mut state = self.state.write().await;
        let message = join.to_message();

        state.clients.send_to(client_id, &message);
        for past in state.lobby.history() {
            state.clients.send_to(client_id, past);
        }
        state.lobby.record(message.clone());
        state.clients.broadcast_excluding(&message, &[client_id]);

        info!("Client {} joined the lobby as {}", client_id, join.name);
        state
            .lobby
            .add_player(client_id, LobbyPlayer::new(join.color, join.name));
        state.start_if_all_ready(&self.phase);
    }

    /// Updates a lobby player's readiness, broadcasts it, and starts the
    /// countdown if this made the whole lobby ready.
    pub async fn lobby_ready(
        &self,
        client_id: ClientId,
        ready: LobbyReady,
    ) -> Result<(), SessionError> {
        let mut state = self.state.write().await;

        match state.lobby.player(client_id) {
            None => {
                return Err(SessionError::IllegalState(
                    "ready toggled before joining the lobby".to_string(),
                ))
            }
            Some(player) if player.color != ready.color => {
                return Err(SessionError::InvalidArgument(format!(
                    "ready message for {} from the player holding {}",
                    ready.color, player.color
                )))
            }
            Some(_) => {}
        }

        state.lobby.set_ready(client_id, ready.ready);
        let message = ready.to_message();
        state.lobby.record(message.clone());
        state.clients.broadcast(&message);

        state.start_if_all_ready(&self.phase);
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
