//! Typed views of message data.
//!
//! Multi-field payloads use `/` between fields. Request/response pairs that
//! a client waits on may carry a request id after a `#` so that replies can
//! be matched to the request that caused them.

use crate::color::Color;
use crate::error::ProtocolError;
use crate::message::{Header, Message};
use crate::TIE_SENTINEL;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FIELD_SEPARATOR: char = '/';
pub const REQUEST_ID_SEPARATOR: char = '#';

pub type CanvasId = usize;
pub type RequestId = u64;

fn split_fields(header: Header, data: &str) -> Result<(&str, &str), ProtocolError> {
    data.split_once(FIELD_SEPARATOR).ok_or_else(|| {
        ProtocolError::invalid_payload(header, format!("expected two '/' separated fields in {data:?}"))
    })
}

fn split_request_id(header: Header, data: &str) -> Result<(&str, Option<RequestId>), ProtocolError> {
    match data.split_once(REQUEST_ID_SEPARATOR) {
        Some((value, id)) => {
            let id = id.parse().map_err(|_| {
                ProtocolError::invalid_payload(header, format!("bad request id {id:?}"))
            })?;
            Ok((value, Some(id)))
        }
        None => Ok((data, None)),
    }
}

fn with_request_id(value: impl fmt::Display, request_id: Option<RequestId>) -> String {
    match request_id {
        Some(id) => format!("{value}{REQUEST_ID_SEPARATOR}{id}"),
        None => value.to_string(),
    }
}

pub fn parse_canvas_id(header: Header, data: &str) -> Result<CanvasId, ProtocolError> {
    data.trim()
        .parse()
        .map_err(|_| ProtocolError::invalid_payload(header, format!("bad canvas id {data:?}")))
}

fn parse_bool(header: Header, data: &str) -> Result<bool, ProtocolError> {
    match data.trim() {
        s if s.eq_ignore_ascii_case("true") => Ok(true),
        s if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(ProtocolError::invalid_payload(
            header,
            format!("expected true/false, got {other:?}"),
        )),
    }
}

/// A pen stroke point, or a whole-canvas clear/own notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawEvent {
    pub x: f64,
    pub y: f64,
    pub canvas_id: CanvasId,
    pub color: Color,
    /// First point of a new stroke.
    #[serde(default)]
    pub path_start: bool,
    #[serde(default)]
    pub clear_canvas: bool,
    #[serde(default)]
    pub own_canvas: bool,
}

impl DrawEvent {
    pub fn stroke(x: f64, y: f64, canvas_id: CanvasId, color: Color, path_start: bool) -> Self {
        Self {
            x,
            y,
            canvas_id,
            color,
            path_start,
            clear_canvas: false,
            own_canvas: false,
        }
    }

    pub fn clear(canvas_id: CanvasId) -> Self {
        Self {
            clear_canvas: true,
            ..Self::stroke(0.0, 0.0, canvas_id, Color::TRANSPARENT, false)
        }
    }

    pub fn own(canvas_id: CanvasId, color: Color) -> Self {
        Self {
            own_canvas: true,
            ..Self::stroke(0.0, 0.0, canvas_id, color, false)
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self)
            .map_err(|e| ProtocolError::invalid_payload(Header::Draw, e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json)
            .map_err(|e| ProtocolError::invalid_payload(Header::Draw, e.to_string()))
    }

    pub fn to_message(&self) -> Result<Message, ProtocolError> {
        Ok(Message::new(Header::Draw, self.to_json()?))
    }
}

/// `COLOR_REQUEST` from client: the color hash, optionally correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRequest {
    pub color_hash: u32,
    pub request_id: Option<RequestId>,
}

impl ColorRequest {
    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let (value, request_id) = split_request_id(Header::ColorRequest, data)?;
        let color_hash = value.trim().parse().map_err(|_| {
            ProtocolError::invalid_payload(Header::ColorRequest, format!("bad color hash {value:?}"))
        })?;
        Ok(Self {
            color_hash,
            request_id,
        })
    }

    pub fn to_message(&self) -> Message {
        Message::new(
            Header::ColorRequest,
            with_request_id(self.color_hash, self.request_id),
        )
    }
}

/// `CANVAS_REQUEST` from client: the canvas id, optionally correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasRequest {
    pub canvas_id: CanvasId,
    pub request_id: Option<RequestId>,
}

impl CanvasRequest {
    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let (value, request_id) = split_request_id(Header::CanvasRequest, data)?;
        Ok(Self {
            canvas_id: parse_canvas_id(Header::CanvasRequest, value)?,
            request_id,
        })
    }

    pub fn to_message(&self) -> Message {
        Message::new(
            Header::CanvasRequest,
            with_request_id(self.canvas_id, self.request_id),
        )
    }
}

/// Server reply to a color or canvas request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub granted: bool,
    pub request_id: Option<RequestId>,
}

impl Grant {
    pub fn parse(header: Header, data: &str) -> Result<Self, ProtocolError> {
        let (value, request_id) = split_request_id(header, data)?;
        Ok(Self {
            granted: parse_bool(header, value)?,
            request_id,
        })
    }

    pub fn to_message(&self, header: Header) -> Message {
        Message::new(header, with_request_id(self.granted, self.request_id))
    }
}

/// `CANVAS_OWN` payload: `canvasID/color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasOwn {
    pub canvas_id: CanvasId,
    pub color: Color,
}

impl CanvasOwn {
    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let (id, color) = split_fields(Header::CanvasOwn, data)?;
        Ok(Self {
            canvas_id: parse_canvas_id(Header::CanvasOwn, id)?,
            color: color.parse()?,
        })
    }

    pub fn to_message(&self) -> Message {
        Message::new(
            Header::CanvasOwn,
            format!("{}{}{}", self.canvas_id, FIELD_SEPARATOR, self.color),
        )
    }
}

/// `SCORE_AND_RESULTS` from client: `score/color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreReport {
    pub score: u32,
    pub color: Color,
}

impl ScoreReport {
    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let (score, color) = split_fields(Header::ScoreAndResults, data)?;
        Ok(Self {
            score: score.trim().parse().map_err(|_| {
                ProtocolError::invalid_payload(Header::ScoreAndResults, format!("bad score {score:?}"))
            })?,
            color: color.parse()?,
        })
    }

    pub fn to_message(&self) -> Message {
        Message::new(
            Header::ScoreAndResults,
            format!("{}{}{}", self.score, FIELD_SEPARATOR, self.color),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Color(Color),
    /// Two or more colors share the top score.
    Tie,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Color(color) => color.fmt(f),
            Winner::Tie => f.write_str(TIE_SENTINEL),
        }
    }
}

/// `SCORE_AND_RESULTS` from server: `score/color` or `score/TIE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResults {
    pub winner_score: u32,
    pub winner: Winner,
}

impl GameResults {
    pub fn is_tie(&self) -> bool {
        self.winner == Winner::Tie
    }

    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let (score, winner) = split_fields(Header::ScoreAndResults, data)?;
        let winner_score = score.trim().parse().map_err(|_| {
            ProtocolError::invalid_payload(Header::ScoreAndResults, format!("bad score {score:?}"))
        })?;
        let winner = if winner.trim() == TIE_SENTINEL {
            Winner::Tie
        } else {
            Winner::Color(winner.parse()?)
        };
        Ok(Self {
            winner_score,
            winner,
        })
    }

    pub fn to_message(&self) -> Message {
        Message::new(
            Header::ScoreAndResults,
            format!("{}{}{}", self.winner_score, FIELD_SEPARATOR, self.winner),
        )
    }
}

/// `LOBBY_PLAYER_JOIN` payload: `color/name`. The name may contain `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyJoin {
    pub color: Color,
    pub name: String,
}

impl LobbyJoin {
    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let (color, name) = split_fields(Header::LobbyPlayerJoin, data)?;
        Ok(Self {
            color: color.parse()?,
            name: name.to_string(),
        })
    }

    pub fn to_message(&self) -> Message {
        Message::new(
            Header::LobbyPlayerJoin,
            format!("{}{}{}", self.color, FIELD_SEPARATOR, self.name),
        )
    }
}

/// `LOBBY_PLAYER_READY` payload: `color/bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbyReady {
    pub color: Color,
    pub ready: bool,
}

impl LobbyReady {
    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let (color, ready) = split_fields(Header::LobbyPlayerReady, data)?;
        Ok(Self {
            color: color.parse()?,
            ready: parse_bool(Header::LobbyPlayerReady, ready)?,
        })
    }

    pub fn to_message(&self) -> Message {
        Message::new(
            Header::LobbyPlayerReady,
            format!("{}{}{}", self.color, FIELD_SEPARATOR, self.ready),
        )
    }
}

pub fn lobby_left_message(color: Color) -> Message {
    Message::new(Header::LobbyPlayerLeft, color.to_string())
}
