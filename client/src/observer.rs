//! Observers of incoming server traffic
//!
//! The reader task hands every decoded message to each registered observer
//! in registration order. Observers run on the reader task, so they must not
//! block; anything slow belongs on the other side of a channel, which is what
//! [`EventQueue`] provides for the UI.

use log::warn;
use shared::payload::parse_canvas_id;
use shared::{
    CanvasId, CanvasOwn, Color, DrawEvent, GameResults, Header, LobbyJoin, LobbyReady, Message,
    ProtocolError,
};
use std::sync::Arc;
use tokio::sync::mpsc;

pub trait NetworkObserver: Send + Sync {
    /// Called for every message the server sends, in arrival order.
    fn message_received(&self, message: &Message);

    /// Called once when the connection to the server ends.
    fn connection_closed(&self) {}
}

/// Something the UI has to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A stroke point, clear or own notification for one canvas
    Draw(DrawEvent),
    CanvasLocked(CanvasId),
    GameOver(GameResults),
    PlayerJoined(LobbyJoin),
    PlayerLeft(Color),
    PlayerReady(LobbyReady),
    CountdownStarted,
    /// The server rejected something this client sent and is closing the connection
    Rejected(String),
    Disconnected,
}

impl ClientEvent {
    /// Interprets a server message. Replies to color and canvas requests are
    /// consumed by the request machinery and yield `None`.
    pub fn from_message(message: &Message) -> Result<Option<Self>, ProtocolError> {
        let event = match message.header {
            Header::Draw => ClientEvent::Draw(DrawEvent::from_json(&message.data)?),
            Header::CanvasClear => ClientEvent::Draw(DrawEvent::clear(parse_canvas_id(
                Header::CanvasClear,
                &message.data,
            )?)),
            Header::CanvasOwn => {
                let own = CanvasOwn::parse(&message.data)?;
                ClientEvent::Draw(DrawEvent::own(own.canvas_id, own.color))
            }
            Header::CanvasLock => {
                ClientEvent::CanvasLocked(parse_canvas_id(Header::CanvasLock, &message.data)?)
            }
            Header::ScoreAndResults => ClientEvent::GameOver(GameResults::parse(&message.data)?),
            Header::LobbyPlayerJoin => ClientEvent::PlayerJoined(LobbyJoin::parse(&message.data)?),
            Header::LobbyPlayerLeft => ClientEvent::PlayerLeft(message.data.parse()?),
            Header::LobbyPlayerReady => ClientEvent::PlayerReady(LobbyReady::parse(&message.data)?),
            Header::LobbyStartCountdown => ClientEvent::CountdownStarted,
            Header::Error => ClientEvent::Rejected(message.data.clone()),
            Header::ColorRequest | Header::CanvasRequest | Header::CanvasRelease => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Turns server traffic into [`ClientEvent`]s on a channel drained by the UI.
pub struct EventQueue {
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl EventQueue {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ClientEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { events }), rx)
    }

    fn push(&self, event: ClientEvent) {
        // The UI may have gone away; nothing else to do then.
        let _ = self.events.send(event);
    }
}

impl NetworkObserver for EventQueue {
    fn message_received(&self, message: &Message) {
        match ClientEvent::from_message(message) {
            Ok(Some(event)) => self.push(event),
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable {} from server: {}", message.header, e),
        }
    }

    fn connection_closed(&self) {
        self.push(ClientEvent::Disconnected);
    }
}
