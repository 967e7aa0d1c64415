use clap::Parser;
use log::info;
use server::config::{ServerConfig, WorldConfig};
use server::network::{BoxError, Server};

/// Authoritative snake arena server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// UDP port to listen on
    #[clap(short, long, env = "PORT", default_value = "3000")]
    port: u16,
    /// Maximum concurrent sessions, spectators included
    #[clap(short, long, default_value = "64")]
    max_players: usize,
    /// Fixed RNG seed for spawns and food
    #[clap(long)]
    seed: Option<u64>,
    /// Chance per tick that a boosting snake drops food
    #[clap(long, default_value = "0.2")]
    boost_drop_chance: f64,
    /// Chance per segment that a dead snake drops food
    #[clap(long, default_value = "0.5")]
    death_drop_chance: f64,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();
    let args = Args::parse();

    let config = ServerConfig {
        max_sessions: args.max_players,
        seed: args.seed,
        world: WorldConfig {
            boost_drop_chance: args.boost_drop_chance,
            death_drop_chance: args.death_drop_chance,
            ..WorldConfig::default()
        },
        ..ServerConfig::default()
    };

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
