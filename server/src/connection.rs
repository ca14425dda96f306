//! Per-connection worker
//!
//! Each accepted socket gets one task running [`handle_connection`]. The read
//! half is consumed line by line on that task; the write half is owned by a
//! separate writer task fed through the client's channel in the
//! [`ClientManager`](crate::client_manager::ClientManager).

use crate::client_manager::ClientId;
use crate::error::{ConnectionError, SessionError};
use crate::session::SessionStore;
use log::{debug, error, info, warn};
use shared::payload::parse_canvas_id;
use shared::{
    CanvasOwn, CanvasRequest, ColorRequest, DrawEvent, Grant, Header, LobbyJoin, LobbyReady,
    Message, ScoreReport,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Serves one client until it disconnects or violates the protocol, then
/// runs the session cleanup for it.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, store: Arc<SessionStore>) {
    let (reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_handle = tokio::spawn(write_lines(writer, rx, addr));

    let client_id = store.connect(addr, tx).await;
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        let result = match read_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => handle_line(&store, client_id, &line).await,
            Ok(None) => {
                debug!("Client {} closed the connection", client_id);
                break;
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {}
            Err(ConnectionError::Io(e)) => {
                error!("Read error from client {}: {}", client_id, e);
                break;
            }
            Err(e) => {
                warn!("Closing client {} ({}): {}", client_id, addr, e);
                store
                    .send_to(client_id, &Message::new(Header::Error, e.to_string()))
                    .await;
                break;
            }
        }
    }

    store.disconnect(client_id).await;

    // The store dropped the sender; the writer flushes what is queued and exits.
    if let Err(e) = writer_handle.await {
        error!("Writer task for client {} panicked: {}", client_id, e);
    }
    info!("Connection to {} finished", addr);
}

/// Reads one `\n`-terminated line without its terminator. Returns `None` at
/// end of stream. Bytes that are not UTF-8 are a protocol violation.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<Option<String>, ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    let line = std::str::from_utf8(buf)
        .map_err(|e| ConnectionError::Violation(format!("line is not valid UTF-8: {}", e)))?;
    Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

/// Drains queued lines into the socket. Stops when every sender is dropped
/// or the socket fails.
async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>, addr: SocketAddr)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("Failed to write to {}: {}", addr, e);
            return;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of {} failed: {}", addr, e);
    }
}

/// Applies one line from a client to the session.
///
/// Contention answers (`false` to a request) are normal replies. Any error
/// returned here ends the connection.
pub async fn handle_line(
    store: &SessionStore,
    client_id: ClientId,
    line: &str,
) -> Result<(), ConnectionError> {
    let message = Message::decode(line)?;
    debug!("Client {} -> {}", client_id, message);

    match message.header {
        Header::ColorRequest => {
            let request = ColorRequest::parse(&message.data)?;
            let granted = store.register_color(client_id, request.color_hash).await;
            let reply = Grant {
                granted,
                request_id: request.request_id,
            };
            store
                .send_to(client_id, &reply.to_message(Header::ColorRequest))
                .await;
        }

        Header::CanvasRequest => {
            let request = CanvasRequest::parse(&message.data)?;
            let granted = store.acquire_canvas(client_id, request.canvas_id).await;
            let reply = Grant {
                granted,
                request_id: request.request_id,
            };
            store
                .send_to(client_id, &reply.to_message(Header::CanvasRequest))
                .await;
        }

        Header::CanvasRelease => {
            store.release_canvas(client_id).await;
        }

        Header::Draw => {
            let event = DrawEvent::from_json(&message.data)?;
            store.relay_draw(client_id, &event, &message).await?;
        }

        Header::CanvasLock => {
            let canvas_id = parse_canvas_id(Header::CanvasLock, &message.data)?;
            store.lock_canvas(canvas_id).await?;
            store.broadcast(&message).await;
        }

        Header::CanvasClear => {
            let canvas_id = parse_canvas_id(Header::CanvasClear, &message.data)?;
            store.ensure_canvas_in_range(canvas_id).await?;
            store.broadcast(&message).await;
        }

        Header::CanvasOwn => {
            let own = CanvasOwn::parse(&message.data)?;
            store.ensure_canvas_in_range(own.canvas_id).await?;
            store.broadcast(&own.to_message()).await;
        }

        Header::ScoreAndResults => {
            let report = ScoreReport::parse(&message.data)?;
            if !store
                .check_valid_color(client_id, report.color.hash_code())
                .await
            {
                return Err(SessionError::IllegalState(format!(
                    "score reported for {} which the client does not hold",
                    report.color
                ))
                .into());
            }
            store.report_score(report).await?;
        }

        Header::LobbyPlayerJoin => {
            let join = LobbyJoin::parse(&message.data)?;
            store.lobby_join(client_id, join).await;
        }

        Header::LobbyPlayerReady => {
            let ready = LobbyReady::parse(&message.data)?;
            store.lobby_ready(client_id, ready).await?;
        }

        Header::LobbyPlayerLeft | Header::LobbyStartCountdown | Header::Error => {
            return Err(ConnectionError::Violation(format!(
                "{} may only be sent by the server",
                message.header
            )));
        }
    }

    Ok(())
}
