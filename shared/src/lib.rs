//! Wire protocol shared by the canvas game server and its clients.
//!
//! Messages are newline-terminated UTF-8 lines of the form `HEADER-DATA`
//! (see [`message`]). The typed payloads carried in the data part live in
//! [`payload`]; player colors are described by [`Color`].

pub mod color;
pub mod error;
pub mod message;
pub mod payload;

pub use color::Color;
pub use error::ProtocolError;
pub use message::{decode, encode, Header, Message};
pub use payload::{
    lobby_left_message, CanvasId, CanvasOwn, CanvasRequest, ColorRequest, DrawEvent, GameResults,
    Grant, LobbyJoin, LobbyReady, RequestId, ScoreReport, Winner,
};

pub const DEFAULT_PORT: u16 = 7070;
pub const DEFAULT_BOARD_SIZE: usize = 8;
/// Points awarded for each canvas a player fills.
pub const POINTS_PER_CANVAS: u32 = 10;
/// Winner field of a results message when no single color has the top score.
pub const TIE_SENTINEL: &str = "TIE";
