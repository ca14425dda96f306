//! Line-oriented wire codec.
//!
//! Every unit on the wire is a single UTF-8 line of the form `HEADER-DATA`.
//! The header is split off at the first `-` only, so the data part may itself
//! contain `-` characters (negative numbers, JSON, player names).

use crate::error::ProtocolError;
use std::fmt;
use std::str::FromStr;

pub const HEADER_SEPARATOR: char = '-';

/// The closed set of message headers understood by client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Header {
    Draw,
    ColorRequest,
    CanvasRequest,
    CanvasRelease,
    CanvasLock,
    CanvasClear,
    CanvasOwn,
    ScoreAndResults,
    LobbyPlayerJoin,
    LobbyPlayerLeft,
    LobbyPlayerReady,
    LobbyStartCountdown,
    /// Sent by the server to a client right before its connection is closed
    /// for violating the protocol.
    Error,
}

impl Header {
    pub const ALL: [Header; 13] = [
        Header::Draw,
        Header::ColorRequest,
        Header::CanvasRequest,
        Header::CanvasRelease,
        Header::CanvasLock,
        Header::CanvasClear,
        Header::CanvasOwn,
        Header::ScoreAndResults,
        Header::LobbyPlayerJoin,
        Header::LobbyPlayerLeft,
        Header::LobbyPlayerReady,
        Header::LobbyStartCountdown,
        Header::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Header::Draw => "DRAW",
            Header::ColorRequest => "COLOR_REQUEST",
            Header::CanvasRequest => "CANVAS_REQUEST",
            Header::CanvasRelease => "CANVAS_RELEASE",
            Header::CanvasLock => "CANVAS_LOCK",
            Header::CanvasClear => "CANVAS_CLEAR",
            Header::CanvasOwn => "CANVAS_OWN",
            Header::ScoreAndResults => "SCORE_AND_RESULTS",
            Header::LobbyPlayerJoin => "LOBBY_PLAYER_JOIN",
            Header::LobbyPlayerLeft => "LOBBY_PLAYER_LEFT",
            Header::LobbyPlayerReady => "LOBBY_PLAYER_READY",
            Header::LobbyStartCountdown => "LOBBY_START_COUNTDOWN",
            Header::Error => "PROTOCOL_ERROR",
        }
    }

    /// Headers that only the server generates. A client sending one of these
    /// is violating the protocol.
    pub fn is_server_only(&self) -> bool {
        matches!(
            self,
            Header::LobbyPlayerLeft | Header::LobbyStartCountdown | Header::Error
        )
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Header {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Header::ALL
            .iter()
            .copied()
            .find(|header| header.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownHeader(s.to_string()))
    }
}

/// One decoded protocol unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub data: String,
}

impl Message {
    pub fn new(header: Header, data: impl Into<String>) -> Self {
        Self {
            header,
            data: data.into(),
        }
    }

    /// A message with no payload, such as `CANVAS_RELEASE-`.
    pub fn empty(header: Header) -> Self {
        Self::new(header, String::new())
    }

    pub fn encode(&self) -> String {
        encode(self.header, &self.data)
    }

    /// Encoded form with the trailing newline used for framing.
    pub fn to_line(&self) -> String {
        let mut line = self.encode();
        line.push('\n');
        line
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let (header, data) = decode(line)?;
        Ok(Self { header, data })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.header, HEADER_SEPARATOR, self.data)
    }
}

pub fn encode(header: Header, data: &str) -> String {
    format!("{}{}{}", header.as_str(), HEADER_SEPARATOR, data)
}

/// Splits a line into header and data at the first `-`.
///
/// A single trailing line terminator (`\n` or `\r\n`) is ignored.
pub fn decode(line: &str) -> Result<(Header, String), ProtocolError> {
    let line = line
        .strip_suffix('\n')
        .unwrap_or(line)
        .trim_end_matches('\r');

    let (header, data) = line
        .split_once(HEADER_SEPARATOR)
        .ok_or_else(|| ProtocolError::MalformedMessage(line.to_string()))?;

    Ok((header.parse()?, data.to_string()))
}
