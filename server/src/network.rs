//! Server network layer: TCP accept loop and listener lifecycle

use crate::connection::handle_connection;
use crate::session::{Phase, SessionConfig, SessionStore};
use log::{error, info, warn};
use shared::{DEFAULT_BOARD_SIZE, DEFAULT_PORT};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Delay between attempts to re-open the listener after a session reset
const REBIND_RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `127.0.0.1:7070`. Port 0 picks a free port.
    pub address: String,
    pub board_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", DEFAULT_PORT),
            board_size: DEFAULT_BOARD_SIZE,
        }
    }
}

/// Accepts players while the session is in the lobby.
///
/// Once the countdown starts the listener is closed so nobody can join a
/// running game. When the last player leaves and the session resets, the
/// server listens again on the same address.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    store: Arc<SessionStore>,
}

impl Server {
    pub async fn bind(
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if config.board_size == 0 {
            return Err("board size must be at least 1".into());
        }

        let listener = TcpListener::bind(&config.address).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "Server listening on {} with {} canvases",
            local_addr, config.board_size
        );

        Ok(Server {
            listener: Some(listener),
            local_addr,
            store: Arc::new(SessionStore::new(SessionConfig {
                board_size: config.board_size,
            })),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    /// Runs the accept loop forever.
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut phase_rx = self.store.subscribe_phase();

        loop {
            match self.listener.take() {
                Some(listener) => {
                    if self.accept_until_game_starts(&listener, &mut phase_rx).await? {
                        self.listener = Some(listener);
                        continue;
                    }
                    drop(listener);
                    info!("Game started, listener on {} closed", self.local_addr);
                }
                None => {
                    wait_for_phase(&mut phase_rx, Phase::Lobby).await?;
                    self.listener = Some(self.rebind().await);
                    info!("Session reset, listening again on {}", self.local_addr);
                }
            }
        }
    }

    /// Accepts connections until the phase switches to in-game. Returns
    /// true if the loop should keep the listener (a phase change that did
    /// not leave the lobby).
    async fn accept_until_game_starts(
        &self,
        listener: &TcpListener,
        phase_rx: &mut watch::Receiver<Phase>,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        loop {
            if *phase_rx.borrow_and_update() == Phase::InGame {
                return Ok(false);
            }

            // A phase change ready alongside a pending accept must win.
            tokio::select! {
                biased;

                changed = phase_rx.changed() => {
                    changed?;
                    if *phase_rx.borrow() == Phase::Lobby {
                        return Ok(true);
                    }
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                            }
                            tokio::spawn(handle_connection(stream, addr, self.store()));
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn rebind(&self) -> TcpListener {
        loop {
            match TcpListener::bind(self.local_addr).await {
                Ok(listener) => return listener,
                Err(e) => {
                    warn!("Failed to rebind {}: {}, retrying", self.local_addr, e);
                    tokio::time::sleep(REBIND_RETRY_DELAY).await;
                }
            }
        }
    }
}

async fn wait_for_phase(
    phase_rx: &mut watch::Receiver<Phase>,
    wanted: Phase,
) -> Result<(), watch::error::RecvError> {
    while *phase_rx.borrow_and_update() != wanted {
        phase_rx.changed().await?;
    }
    Ok(())
}
