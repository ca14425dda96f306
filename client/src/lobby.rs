//! Client-side view of the pre-game lobby.

use crate::observer::NetworkObserver;
use log::{debug, warn};
use parking_lot::RwLock;
use shared::{Color, Header, LobbyJoin, LobbyReady, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub color: Color,
    pub name: String,
    pub ready: bool,
    /// This entry is the local player
    pub is_local: bool,
}

#[derive(Debug, Default)]
struct RosterState {
    local_color: Option<Color>,
    players: Vec<RosterEntry>,
    countdown_started: bool,
}

/// Keeps the lobby roster in sync with the server's lobby messages.
///
/// Players are identified by color, which the server keeps unique.
#[derive(Debug, Default)]
pub struct LobbyRoster {
    state: RwLock<RosterState>,
}

impl LobbyRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks which color belongs to the local player. Entries already in the
    /// roster are updated.
    pub fn set_local_color(&self, color: Color) {
        let mut state = self.state.write();
        state.local_color = Some(color);
        for entry in state.players.iter_mut() {
            entry.is_local = entry.color == color;
        }
    }

    pub fn players(&self) -> Vec<RosterEntry> {
        self.state.read().players.clone()
    }

    pub fn player(&self, color: Color) -> Option<RosterEntry> {
        self.state
            .read()
            .players
            .iter()
            .find(|entry| entry.color == color)
            .cloned()
    }

    pub fn ready_count(&self) -> usize {
        self.state.read().players.iter().filter(|p| p.ready).count()
    }

    pub fn countdown_started(&self) -> bool {
        self.state.read().countdown_started
    }

    fn apply(&self, message: &Message) -> Result<(), shared::ProtocolError> {
        let mut state = self.state.write();

        match message.header {
            Header::LobbyPlayerJoin => {
                let join = LobbyJoin::parse(&message.data)?;
                let is_local = state.local_color == Some(join.color);
                let entry = RosterEntry {
                    color: join.color,
                    name: join.name,
                    ready: false,
                    is_local,
                };
                match state.players.iter_mut().find(|p| p.color == entry.color) {
                    Some(existing) => *existing = entry,
                    None => state.players.push(entry),
                }
            }
            Header::LobbyPlayerLeft => {
                let color: Color = message.data.parse()?;
                state.players.retain(|p| p.color != color);
            }
            Header::LobbyPlayerReady => {
                let ready = LobbyReady::parse(&message.data)?;
                match state.players.iter_mut().find(|p| p.color == ready.color) {
                    Some(entry) => entry.ready = ready.ready,
                    None => debug!("Ready toggle for unknown player {}", ready.color),
                }
            }
            Header::LobbyStartCountdown => state.countdown_started = true,
            _ => {}
        }
        Ok(())
    }
}

impl NetworkObserver for LobbyRoster {
    fn message_received(&self, message: &Message) {
        if let Err(e) = self.apply(message) {
            warn!("Ignoring unreadable lobby message: {}", e);
        }
    }
}
