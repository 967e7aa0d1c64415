use clap::Parser;
use client::input::InputManager;
use client::network::{BoxError, Client, ClientStatus};
use client::rendering::{Frame, Renderer};
use log::{error, info};
use macroquad::prelude::*;
use shared::{DEFAULT_COLOR, DEFAULT_NAME, INTERPOLATION_FACTOR};
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Display name
    #[arg(short = 'n', long, default_value = DEFAULT_NAME)]
    name: String,

    /// Snake color as #rrggbb
    #[arg(short = 'c', long, default_value = DEFAULT_COLOR)]
    color: String,

    /// Window width
    #[arg(short = 'w', long, default_value = "1024")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "768")]
    height: i32,
}

fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    // macroquad owns the main thread; the socket task runs on tokio workers.
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start tokio runtime: {}", e);
            return;
        }
    };

    let conf = Conf {
        window_title: "Snake Arena".to_string(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    };

    macroquad::Window::from_config(conf, async move {
        if let Err(e) = run(args, &runtime).await {
            error!("Client error: {}", e);
        }
    });
}

async fn run(args: Args, runtime: &Runtime) -> Result<(), BoxError> {
    info!("Starting client...");
    info!("Controls: mouse to steer, left click or Space to boost, Enter to respawn");

    let mut client = runtime.block_on(Client::connect(&args.server))?;
    client.join(&args.name, &args.color)?;

    let mut input_manager = InputManager::new();
    let mut renderer = Renderer::new();

    loop {
        client.poll();

        let input = input_manager.update();
        if input.quit {
            break;
        }
        if input.respawn && matches!(client.status(), ClientStatus::Dead | ClientStatus::Spectating)
        {
            client.join(&args.name, &args.color)?;
        }
        if let Err(e) = client.send_input(input.angle, input.boosting) {
            error!("Error sending input: {}", e);
        }

        client.state_mut().interpolate(INTERPOLATION_FACTOR);

        let frame = Frame {
            state: client.state(),
            me: client.player_id(),
            status: client.status(),
            last_score: client.last_score(),
            kill_feed: client.kill_feed().collect(),
        };
        renderer.render(&frame);

        next_frame().await;
    }

    client.leave()?;
    Ok(())
}
