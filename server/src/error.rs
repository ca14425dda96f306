use shared::ProtocolError;

/// Caller errors surfaced by the session store.
///
/// Contention (a color or canvas already taken) is not an error; those
/// operations answer with a plain `bool`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("illegal state: {0}")]
    IllegalState(String),
}

/// Why a connection worker gave up on its client.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Well-formed message the client is not allowed to send.
    #[error("protocol violation: {0}")]
    Violation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
