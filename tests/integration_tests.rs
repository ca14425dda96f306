//! Integration tests for the canvas game server and client
//!
//! These tests run a real server on an ephemeral port and talk to it either
//! through the client facade or through raw line-oriented sockets.

use assert_approx_eq::assert_approx_eq;
use client::{ClientConfig, ClientEvent, EventQueue, NetworkClient};
use server::{Server, ServerConfig};
use shared::{Color, Header, Message, ProtocolError, Winner};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

async fn start_server(board_size: usize) -> SocketAddr {
    let server = Server::bind(ServerConfig {
        address: "127.0.0.1:0".to_string(),
        board_size,
    })
    .await
    .expect("Failed to bind server");
    let addr = server.local_addr();
    tokio::spawn(server.run());
    addr
}

/// Generous timeout so slow CI machines do not turn replies into refusals.
fn test_config() -> ClientConfig {
    ClientConfig {
        response_timeout: WAIT,
    }
}

async fn connect_client(addr: SocketAddr) -> NetworkClient {
    NetworkClient::connect(addr, test_config())
        .await
        .expect("Failed to connect client")
}

/// Plain socket speaking the line protocol, for checking exact wire output.
struct RawClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl RawClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("Failed to connect");
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.send_bytes(line.as_bytes()).await;
    }

    async fn send_bytes(&mut self, line: &[u8]) {
        self.writer.write_all(line).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    /// Next line from the server, or `None` once it closed the connection.
    async fn recv(&mut self) -> Option<String> {
        timeout(WAIT, self.lines.next_line())
            .await
            .expect("Timed out waiting for the server")
            .unwrap_or(None)
    }

    async fn expect(&mut self, expected: &str) {
        assert_eq!(self.recv().await.as_deref(), Some(expected));
    }
}

async fn next_event(
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
    matches: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("Event channel closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("Timed out waiting for event")
}

/// Polls until connecting to `addr` gives the wanted outcome.
async fn wait_for_listener(addr: SocketAddr, listening: bool) -> bool {
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() == listening {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    false
}

/// WIRE CODEC TESTS
mod protocol_tests {
    use super::*;

    /// Draw payloads keep their inner dashes and quotes intact
    #[test]
    fn decode_draw_json() {
        let message = Message::decode("DRAW-{\"x\":1.0}").unwrap();
        assert_eq!(message.header, Header::Draw);
        assert_eq!(message.data, "{\"x\":1.0}");
    }

    #[test]
    fn decode_without_separator_fails() {
        assert!(matches!(
            Message::decode("DRAW"),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    /// A malformed line closes only the offending connection
    #[tokio::test]
    async fn protocol_error_closes_only_offender() {
        let addr = start_server(4).await;
        let mut offender = RawClient::connect(addr).await;
        let mut bystander = RawClient::connect(addr).await;

        offender.send("TELEPORT-1").await;
        let reply = offender.recv().await.expect("Expected an error reply");
        assert!(reply.starts_with("PROTOCOL_ERROR-"), "{}", reply);
        assert_eq!(offender.recv().await, None);

        bystander.send("CANVAS_REQUEST-0#1").await;
        bystander.expect("CANVAS_REQUEST-true#1").await;
    }

    /// Bytes that are not UTF-8 are answered with an error, not a silent close
    #[tokio::test]
    async fn invalid_utf8_is_reported() {
        let addr = start_server(4).await;
        let mut client = RawClient::connect(addr).await;

        client.send_bytes(b"DRAW-\xff\xfe").await;
        let reply = client.recv().await.expect("Expected an error reply");
        assert!(reply.starts_with("PROTOCOL_ERROR-"), "{}", reply);
        assert_eq!(client.recv().await, None);
    }

    /// Clients may not impersonate the server
    #[tokio::test]
    async fn server_only_header_is_rejected() {
        let addr = start_server(4).await;
        let mut client = RawClient::connect(addr).await;

        client.send("LOBBY_START_COUNTDOWN-").await;
        let reply = client.recv().await.unwrap();
        assert!(reply.starts_with("PROTOCOL_ERROR-"), "{}", reply);
        assert_eq!(client.recv().await, None);
    }
}

/// COLOR AND CANVAS ARBITRATION TESTS
mod arbitration_tests {
    use super::*;

    /// Two clients contend for a color and a canvas
    #[tokio::test]
    async fn color_and_canvas_contention() {
        let addr = start_server(8).await;
        let a = connect_client(addr).await;
        let b = connect_client(addr).await;

        assert!(a.register_color(Color::RED).await.unwrap());
        assert!(!b.register_color(Color::RED).await.unwrap());
        assert!(b.register_color(Color::BLUE).await.unwrap());

        a.start_client().unwrap();
        b.start_client().unwrap();

        assert!(a.select_canvas_for_drawing(3).await.unwrap());
        assert!(!b.select_canvas_for_drawing(3).await.unwrap());

        a.release_canvas().unwrap();
        // Round trip on A's connection so the release is applied first.
        assert!(a.register_color(Color::RED).await.unwrap());

        assert!(b.select_canvas_for_drawing(3).await.unwrap());
        assert_eq!(b.current_canvas(), Some(3));
        assert_eq!(a.current_canvas(), None);
    }

    /// Many clients race for one canvas; exactly one wins
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_canvas_race_has_one_winner() {
        let addr = start_server(8).await;
        let mut clients = Vec::new();
        for color in [Color::RED, Color::BLUE, Color::GREEN, Color::YELLOW] {
            let client = connect_client(addr).await;
            assert!(client.register_color(color).await.unwrap());
            client.start_client().unwrap();
            clients.push(client);
        }

        let mut handles = Vec::new();
        for client in clients {
            handles.push(tokio::spawn(async move {
                client.select_canvas_for_drawing(5).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    /// Locked canvases stay locked after their owner releases them
    #[tokio::test]
    async fn locked_canvas_cannot_be_claimed() {
        let addr = start_server(4).await;
        let a = connect_client(addr).await;
        let b = connect_client(addr).await;
        let (queue, mut events) = EventQueue::new();
        b.add_observer(queue);

        assert!(a.register_color(Color::RED).await.unwrap());
        assert!(b.register_color(Color::BLUE).await.unwrap());
        a.start_client().unwrap();
        b.start_client().unwrap();

        assert!(a.select_canvas_for_drawing(1).await.unwrap());
        a.send_lock_canvas().unwrap();
        a.release_canvas().unwrap();

        assert_eq!(
            next_event(&mut events, |e| matches!(e, ClientEvent::CanvasLocked(_))).await,
            ClientEvent::CanvasLocked(1)
        );
        assert!(!b.select_canvas_for_drawing(1).await.unwrap());
        assert!(!a.select_canvas_for_drawing(1).await.unwrap());
    }
}

/// DRAWING AND SCORING TESTS
mod game_tests {
    use super::*;

    /// Strokes reach other players but not the sender
    #[tokio::test]
    async fn draw_is_relayed_to_others() {
        let addr = start_server(4).await;
        let a = connect_client(addr).await;
        let b = connect_client(addr).await;
        let (queue_a, mut events_a) = EventQueue::new();
        let (queue_b, mut events_b) = EventQueue::new();
        a.add_observer(queue_a);
        b.add_observer(queue_b);

        assert!(a.register_color(Color::RED).await.unwrap());
        a.start_client().unwrap();
        assert!(a.select_canvas_for_drawing(2).await.unwrap());
        a.send_drawing(5.0, 6.0).unwrap();
        a.send_drawing(7.0, 8.0).unwrap();
        a.send_clear_canvas().unwrap();

        let ClientEvent::Draw(first) =
            next_event(&mut events_b, |e| matches!(e, ClientEvent::Draw(_))).await
        else {
            unreachable!()
        };
        assert_eq!(first.canvas_id, 2);
        assert_eq!(first.color, Color::RED);
        assert_approx_eq!(first.x, 5.0);
        assert_approx_eq!(first.y, 6.0);
        assert!(first.path_start);

        let ClientEvent::Draw(second) =
            next_event(&mut events_b, |e| matches!(e, ClientEvent::Draw(_))).await
        else {
            unreachable!()
        };
        assert!(!second.path_start);

        // The sender only sees the clear, which goes to everyone.
        let ClientEvent::Draw(clear) =
            next_event(&mut events_a, |e| matches!(e, ClientEvent::Draw(_))).await
        else {
            unreachable!()
        };
        assert!(clear.clear_canvas);
    }

    /// Filling the board triggers a results broadcast
    #[tokio::test]
    async fn full_board_announces_tie() {
        let addr = start_server(2).await;
        let a = connect_client(addr).await;
        let b = connect_client(addr).await;
        let (queue, mut events) = EventQueue::new();
        b.add_observer(queue);

        assert!(a.register_color(Color::RED).await.unwrap());
        assert!(b.register_color(Color::BLUE).await.unwrap());
        a.start_client().unwrap();
        b.start_client().unwrap();

        assert!(a.select_canvas_for_drawing(0).await.unwrap());
        a.send_lock_canvas().unwrap();
        a.send_score(10).unwrap();
        // Round trip on A's connection so its lock and score land first.
        assert!(a.register_color(Color::RED).await.unwrap());

        assert!(b.select_canvas_for_drawing(1).await.unwrap());
        b.send_lock_canvas().unwrap();
        b.send_score(10).unwrap();

        match next_event(&mut events, |e| matches!(e, ClientEvent::GameOver(_))).await {
            ClientEvent::GameOver(results) => {
                assert_eq!(results.winner_score, 10);
                assert_eq!(results.winner, Winner::Tie);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    /// The higher score wins outright
    #[tokio::test]
    async fn full_board_announces_winner() {
        let addr = start_server(1).await;
        let mut a = RawClient::connect(addr).await;

        a.send(&format!("COLOR_REQUEST-{}", Color::RED.hash_code()))
            .await;
        a.expect("COLOR_REQUEST-true").await;
        a.send("CANVAS_LOCK-0").await;
        a.expect("CANVAS_LOCK-0").await;
        a.send("SCORE_AND_RESULTS-40/RED").await;
        a.expect("SCORE_AND_RESULTS-40/0xff0000ff").await;
    }
}

/// LOBBY TESTS
mod lobby_tests {
    use super::*;

    /// A joiner sees its own echo, then history; others see the join
    #[tokio::test]
    async fn join_order_is_echo_then_history() {
        let addr = start_server(4).await;
        let mut a = RawClient::connect(addr).await;
        let mut b = RawClient::connect(addr).await;

        a.send("LOBBY_PLAYER_JOIN-RED/alice").await;
        a.expect("LOBBY_PLAYER_JOIN-0xff0000ff/alice").await;

        b.send("LOBBY_PLAYER_JOIN-BLUE/bob").await;
        b.expect("LOBBY_PLAYER_JOIN-0x0000ffff/bob").await;
        b.expect("LOBBY_PLAYER_JOIN-0xff0000ff/alice").await;

        a.expect("LOBBY_PLAYER_JOIN-0x0000ffff/bob").await;
    }

    /// Leaving players are announced by color
    #[tokio::test]
    async fn leaving_player_is_announced() {
        let addr = start_server(4).await;
        let mut a = RawClient::connect(addr).await;
        let mut b = RawClient::connect(addr).await;

        a.send("LOBBY_PLAYER_JOIN-RED/alice").await;
        a.expect("LOBBY_PLAYER_JOIN-0xff0000ff/alice").await;
        b.send("LOBBY_PLAYER_JOIN-BLUE/bob").await;
        a.expect("LOBBY_PLAYER_JOIN-0x0000ffff/bob").await;

        drop(b);
        a.expect("LOBBY_PLAYER_LEFT-0x0000ffff").await;
    }

    /// Everyone ready starts the game once, closes the door, and the last
    /// departure reopens it with a clean slate
    #[tokio::test]
    async fn countdown_closes_listener_until_reset() {
        let addr = start_server(4).await;
        let mut a = RawClient::connect(addr).await;
        let mut b = RawClient::connect(addr).await;

        a.send("LOBBY_PLAYER_JOIN-RED/alice").await;
        a.expect("LOBBY_PLAYER_JOIN-0xff0000ff/alice").await;
        b.send("LOBBY_PLAYER_JOIN-BLUE/bob").await;
        b.expect("LOBBY_PLAYER_JOIN-0x0000ffff/bob").await;
        b.expect("LOBBY_PLAYER_JOIN-0xff0000ff/alice").await;
        a.expect("LOBBY_PLAYER_JOIN-0x0000ffff/bob").await;

        a.send("LOBBY_PLAYER_READY-RED/true").await;
        a.expect("LOBBY_PLAYER_READY-0xff0000ff/true").await;
        b.expect("LOBBY_PLAYER_READY-0xff0000ff/true").await;

        b.send("LOBBY_PLAYER_READY-BLUE/true").await;
        for client in [&mut a, &mut b] {
            client.expect("LOBBY_PLAYER_READY-0x0000ffff/true").await;
            client.expect("LOBBY_START_COUNTDOWN-").await;
        }

        // Toggling readiness again must not restart the countdown.
        b.send("LOBBY_PLAYER_READY-BLUE/false").await;
        b.expect("LOBBY_PLAYER_READY-0x0000ffff/false").await;
        b.send("LOBBY_PLAYER_READY-BLUE/true").await;
        b.expect("LOBBY_PLAYER_READY-0x0000ffff/true").await;
        b.send("CANVAS_LOCK-0").await;
        b.expect("CANVAS_LOCK-0").await;

        assert!(wait_for_listener(addr, false).await, "listener still open");

        drop(a);
        drop(b);
        assert!(wait_for_listener(addr, true).await, "listener not reopened");

        // Give probe connections time to be cleaned up before the real one.
        sleep(Duration::from_millis(100)).await;
        let mut c = RawClient::connect(addr).await;
        c.send("LOBBY_PLAYER_JOIN-GREEN/carol").await;
        c.expect("LOBBY_PLAYER_JOIN-0x008000ff/carol").await;
        c.send("CANVAS_REQUEST-0#9").await;
        c.expect("CANVAS_REQUEST-true#9").await;
    }
}
