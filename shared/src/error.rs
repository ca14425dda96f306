use crate::message::Header;

/// Reasons a line received from the network cannot be turned into a message.
///
/// These are protocol violations by the peer, never programming errors on
/// the receiving side, so every decode path returns them instead of panicking.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The line has no `-` separating header from data.
    #[error("malformed message (missing '-' separator): {0:?}")]
    MalformedMessage(String),

    /// The header is not part of the message catalogue.
    #[error("unknown message header: {0:?}")]
    UnknownHeader(String),

    /// The header is known but its data could not be parsed.
    #[error("invalid {header} payload: {reason}")]
    InvalidPayload { header: Header, reason: String },

    /// A color field could not be parsed.
    #[error("invalid color: {0:?}")]
    InvalidColor(String),
}

impl ProtocolError {
    pub fn invalid_payload(header: Header, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidPayload {
            header,
            reason: reason.into(),
        }
    }
}
