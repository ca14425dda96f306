//! Pre-game lobby bookkeeping: membership, readiness and the event history
//! replayed to late joiners.

use crate::client_manager::ClientId;
use shared::{Color, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyPlayer {
    pub color: Color,
    pub name: String,
    pub ready: bool,
}

impl LobbyPlayer {
    pub fn new(color: Color, name: impl Into<String>) -> Self {
        Self {
            color,
            name: name.into(),
            ready: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Lobby {
    /// Players in join order
    players: Vec<(ClientId, LobbyPlayer)>,
    /// Join, ready and left messages in the order they were broadcast
    history: Vec<Message>,
    countdown_started: bool,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player, or replaces the entry if the client joins again.
    pub fn add_player(&mut self, client_id: ClientId, player: LobbyPlayer) {
        match self.players.iter_mut().find(|(id, _)| *id == client_id) {
            Some((_, existing)) => *existing = player,
            None => self.players.push((client_id, player)),
        }
    }

    pub fn remove_player(&mut self, client_id: ClientId) -> Option<LobbyPlayer> {
        let index = self.players.iter().position(|(id, _)| *id == client_id)?;
        Some(self.players.remove(index).1)
    }

    pub fn player(&self, client_id: ClientId) -> Option<&LobbyPlayer> {
        self.players
            .iter()
            .find(|(id, _)| *id == client_id)
            .map(|(_, player)| player)
    }

    pub fn players(&self) -> impl Iterator<Item = &LobbyPlayer> {
        self.players.iter().map(|(_, player)| player)
    }

    /// Returns false if the client never joined.
    pub fn set_ready(&mut self, client_id: ClientId, ready: bool) -> bool {
        match self.players.iter_mut().find(|(id, _)| *id == client_id) {
            Some((_, player)) => {
                player.ready = ready;
                true
            }
            None => false,
        }
    }

    pub fn record(&mut self, message: Message) {
        self.history.push(message);
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.players.iter().filter(|(_, player)| player.ready).count()
    }

    pub fn countdown_started(&self) -> bool {
        self.countdown_started
    }

    /// Returns true exactly once per session: on the first call that finds a
    /// non-empty lobby with every player ready.
    pub fn check_all_ready(&mut self) -> bool {
        if self.countdown_started || self.players.is_empty() {
            return false;
        }
        if self.ready_count() == self.players.len() {
            self.countdown_started = true;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
