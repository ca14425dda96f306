use clap::Parser;
use client::{ClientConfig, ClientError, ClientEvent, EventQueue, LobbyRoster, NetworkClient};
use log::{info, warn};
use shared::{Color, DEFAULT_PORT};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Player name shown in the lobby
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Color to register, e.g. RED or 0xff0000ff
    #[arg(short = 'c', long)]
    color: Option<Color>,

    /// How long to wait for color/canvas replies, in milliseconds
    #[arg(short = 't', long, default_value = "150")]
    response_timeout_ms: u64,
}

const HELP: &str = "commands: color <c> | join [name] | ready | unready | start | \
canvas <id> | draw <x> <y> | lock | clear | own | release | score <n> | players | quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let config = ClientConfig {
        response_timeout: Duration::from_millis(args.response_timeout_ms),
    };
    let client = NetworkClient::connect(&args.server, config).await?;

    let (queue, mut events) = EventQueue::new();
    let roster = Arc::new(LobbyRoster::new());
    client.add_observer(queue);
    client.add_observer(roster.clone());

    if let Some(color) = args.color {
        if client.register_color(color).await? {
            roster.set_local_color(color);
            client.join_lobby(&args.name)?;
        } else {
            warn!("Color {} is taken", color);
        }
    }

    println!("{}", HELP);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                match run_command(&client, &roster, &args.name, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("error: {}", e),
                }
            }
            event = events.recv() => {
                match event {
                    Some(ClientEvent::Disconnected) | None => {
                        println!("disconnected from server");
                        break;
                    }
                    Some(event) => println!("{:?}", event),
                }
            }
        }
    }

    Ok(())
}

/// Runs one console command. Returns false when the user wants to quit.
async fn run_command(
    client: &NetworkClient,
    roster: &LobbyRoster,
    default_name: &str,
    line: &str,
) -> Result<bool, ClientError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(true);
    };
    let arg = words.next();

    match (command, arg) {
        ("color", Some(value)) => match value.parse::<Color>() {
            Ok(color) => {
                let granted = client.register_color(color).await?;
                if granted {
                    roster.set_local_color(color);
                }
                println!("color {}: {}", color, granted);
            }
            Err(e) => println!("{}", e),
        },
        ("join", name) => client.join_lobby(name.unwrap_or(default_name))?,
        ("ready", _) => client.set_ready(true)?,
        ("unready", _) => client.set_ready(false)?,
        ("start", _) => client.start_client()?,
        ("canvas", Some(id)) => match id.parse() {
            Ok(id) => println!("canvas {}: {}", id, client.select_canvas_for_drawing(id).await?),
            Err(_) => println!("bad canvas id {:?}", id),
        },
        ("draw", Some(x)) => match (x.parse(), words.next().map(str::parse)) {
            (Ok(x), Some(Ok(y))) => client.send_drawing(x, y)?,
            _ => println!("usage: draw <x> <y>"),
        },
        ("lock", _) => client.send_lock_canvas()?,
        ("clear", _) => client.send_clear_canvas()?,
        ("own", _) => client.send_own_canvas()?,
        ("release", _) => client.release_canvas()?,
        ("score", Some(score)) => match score.parse() {
            Ok(score) => client.send_score(score)?,
            Err(_) => println!("bad score {:?}", score),
        },
        ("players", _) => {
            for player in roster.players() {
                let marker = if player.is_local { " (you)" } else { "" };
                println!(
                    "{} {}{} ready={}",
                    player.color, player.name, marker, player.ready
                );
            }
        }
        ("quit", _) | ("exit", _) => return Ok(false),
        _ => println!("{}", HELP),
    }

    Ok(true)
}
