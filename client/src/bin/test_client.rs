//! Headless bot player for exercising a running server.
//!
//! The bot registers a random free color, joins the lobby and readies up.
//! After the countdown it keeps claiming random unlocked canvases, scribbles
//! on them, owns and locks them, and reports its score until the server
//! announces the results.

use clap::Parser;
use client::{ClientConfig, ClientEvent, EventQueue, NetworkClient};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{CanvasId, Color, DEFAULT_BOARD_SIZE, DEFAULT_PORT, POINTS_PER_CANVAS};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Lobby name
    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// Number of canvases on the server's board
    #[arg(short = 'b', long, default_value_t = DEFAULT_BOARD_SIZE)]
    board_size: usize,

    /// Stroke points drawn on each claimed canvas
    #[arg(long, default_value = "20")]
    strokes: usize,

    /// Pause between actions in milliseconds
    #[arg(short = 'd', long, default_value = "20")]
    delay_ms: u64,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

/// What the bot has learned from the server so far.
#[derive(Default)]
struct BotView {
    locked: HashSet<CanvasId>,
    countdown: bool,
    finished: bool,
}

impl BotView {
    /// Applies every queued event. Returns false once the server is gone.
    fn drain(&mut self, events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> bool {
        while let Ok(event) = events.try_recv() {
            match event {
                ClientEvent::CanvasLocked(canvas_id) => {
                    self.locked.insert(canvas_id);
                }
                ClientEvent::CountdownStarted => self.countdown = true,
                ClientEvent::GameOver(results) => {
                    info!(
                        "Results: {} with {} points",
                        results.winner, results.winner_score
                    );
                    self.finished = true;
                }
                ClientEvent::Rejected(reason) => warn!("Server rejected us: {}", reason),
                ClientEvent::Disconnected => return false,
                _ => {}
            }
        }
        true
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let delay = Duration::from_millis(args.delay_ms);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let client = NetworkClient::connect(&args.server, ClientConfig::default()).await?;
    let (queue, mut events) = EventQueue::new();
    client.add_observer(queue);

    let mut palette: Vec<Color> = Color::PALETTE.iter().map(|(_, color)| *color).collect();
    palette.shuffle(&mut rng);
    let mut color = None;
    for candidate in palette {
        if client.register_color(candidate).await? {
            color = Some(candidate);
            break;
        }
    }
    let Some(color) = color else {
        return Err("every palette color is taken".into());
    };
    info!("Playing as {} ({})", args.name, color);

    client.join_lobby(&args.name)?;
    client.set_ready(true)?;
    client.start_client()?;

    let mut view = BotView::default();
    while !view.countdown {
        if !view.drain(&mut events) {
            return Err("server closed the connection in the lobby".into());
        }
        sleep(delay).await;
    }
    info!("Countdown started");

    let mut score = 0;
    while !view.finished {
        if !view.drain(&mut events) {
            break;
        }

        let free: Vec<CanvasId> = (0..args.board_size)
            .filter(|id| !view.locked.contains(id))
            .collect();
        let Some(&canvas_id) = free.choose(&mut rng) else {
            // Board full; wait for the results broadcast.
            sleep(delay).await;
            continue;
        };

        if !client.select_canvas_for_drawing(canvas_id).await? {
            sleep(delay).await;
            continue;
        }

        for _ in 0..args.strokes {
            let x = rng.gen_range(0.0..100.0);
            let y = rng.gen_range(0.0..100.0);
            client.send_drawing(x, y)?;
            sleep(delay / 4).await;
        }
        client.send_own_canvas()?;
        client.send_lock_canvas()?;
        client.release_canvas()?;
        view.locked.insert(canvas_id);

        score += POINTS_PER_CANVAS;
        client.send_score(score)?;
        info!("Filled canvas {}, score {}", canvas_id, score);
        sleep(delay).await;
    }

    Ok(())
}
