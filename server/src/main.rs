use clap::Parser;
use log::info;
use server::{Server, ServerConfig};
use shared::{DEFAULT_BOARD_SIZE, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Number of canvases on the board
    #[arg(short, long, default_value_t = DEFAULT_BOARD_SIZE as u16,
          value_parser = clap::value_parser!(u16).range(1..))]
    board_size: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let server = Server::bind(ServerConfig {
        address: format!("{}:{}", args.host, args.port),
        board_size: usize::from(args.board_size),
    })
    .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
