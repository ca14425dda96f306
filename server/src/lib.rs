//! # Canvas Game Server Library
//!
//! Authoritative coordinator for a shared-canvas drawing game. Players
//! connect over TCP, claim a unique color, gather in a lobby until everyone
//! is ready, and then race to fill the canvases of a shared board. The
//! server arbitrates who may draw where, relays strokes between players and
//! announces the winner once the board is full.
//!
//! ## Core Responsibilities
//!
//! ### Arbitration
//! Colors and canvases are exclusive resources. Concurrent claims are
//! resolved atomically: for any contested color or canvas exactly one
//! claimant is told `true`.
//!
//! ### Relaying
//! Strokes are forwarded to every other player; lock, clear and own
//! notifications reach everyone, the sender included.
//!
//! ### Lobby
//! Late joiners replay the lobby history so every player sees the same
//! roster. The start countdown is broadcast once per session, at which point
//! the server stops accepting new connections.
//!
//! ## Module Organization
//!
//! - `client_manager`: connected clients and their outbound channels
//! - `game`: color registry, canvas ownership and locks
//! - `scoring`: per-color scores and winner resolution
//! - `lobby`: lobby roster, readiness and history
//! - `session`: the above behind one lock, plus the server phase
//! - `connection`: per-connection read loop and message dispatch
//! - `network`: accept loop and listener lifecycle
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let server = Server::bind(ServerConfig {
//!         address: "127.0.0.1:7070".to_string(),
//!         board_size: 8,
//!     })
//!     .await?;
//!
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod connection;
pub mod error;
pub mod game;
pub mod lobby;
pub mod network;
pub mod scoring;
pub mod session;

pub use client_manager::ClientId;
pub use error::{ConnectionError, SessionError};
pub use network::{Server, ServerConfig};
pub use session::{Phase, SessionConfig, SessionStore};
