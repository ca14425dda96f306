use shared::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection to the server is gone; nothing more can be sent.
    #[error("not connected to the server")]
    Disconnected,

    /// The facade was used out of order, e.g. drawing before selecting a canvas.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
