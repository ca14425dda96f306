//! # Canvas Game Client Library
//!
//! Client-side networking for the shared-canvas drawing game. The UI talks
//! to the server exclusively through [`NetworkClient`], and learns about
//! what other players do by draining events produced by observers.
//!
//! ## Architecture Overview
//!
//! ### Request/Response over a Push Protocol
//! The server pushes messages whenever it likes. Color and canvas claims
//! still need an answer before the UI can proceed, so the facade tags each
//! claim with a request id and waits for the matching reply, giving up after
//! a short timeout. A timeout counts as "not granted".
//!
//! ### Observers
//! Every message from the server is handed to each registered
//! [`NetworkObserver`] in registration order, on the reader task.
//! [`EventQueue`] forwards drawing, lock, score and lobby traffic to the UI
//! over a channel; [`LobbyRoster`] keeps the lobby player list current.
//!
//! ## Module Organization
//!
//! - `network`: the [`NetworkClient`] facade and its reader/writer tasks
//! - `observer`: the observer trait, [`ClientEvent`] and [`EventQueue`]
//! - `lobby`: the [`LobbyRoster`] observer
//! - `error`: [`ClientError`]
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{ClientConfig, EventQueue, NetworkClient};
//! use shared::Color;
//!
//! # async fn example() -> Result<(), client::ClientError> {
//! let client = NetworkClient::connect("127.0.0.1:7070", ClientConfig::default()).await?;
//! let (queue, mut events) = EventQueue::new();
//! client.add_observer(queue);
//!
//! if client.register_color(Color::RED).await? {
//!     client.start_client()?;
//!     if client.select_canvas_for_drawing(0).await? {
//!         client.send_drawing(10.0, 12.5)?;
//!         client.send_lock_canvas()?;
//!     }
//! }
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod lobby;
pub mod network;
pub mod observer;

pub use error::ClientError;
pub use lobby::{LobbyRoster, RosterEntry};
pub use network::{ClientConfig, NetworkClient, DEFAULT_RESPONSE_TIMEOUT};
pub use observer::{ClientEvent, EventQueue, NetworkObserver};
