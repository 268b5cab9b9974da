//! Analyze the starting position with an unbounded search.
//!
//! Spawns an engine, runs the handshake, sets up a new game at the
//! starting position, streams `info` lines for two seconds, then stops
//! and prints the best move.
//!
//! ```sh
//! cargo run --example analyze_start_position -- /path/to/stockfish
//! ```

use std::time::Duration;

use uciwire::{Engine, Setup};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uciwire=debug".into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "stockfish".to_string());

    let engine = Engine::spawn(&path, std::iter::empty::<&str>()).await?;
    println!("started {path} (pid {})", engine.pid());

    let identity = engine.handshake().await?;
    println!(
        "engine: {} by {}",
        identity.name.as_deref().unwrap_or("unknown"),
        identity.author.as_deref().unwrap_or("unknown"),
    );

    engine.ready().await?;
    engine.new_game().await?;
    engine.set_position(Setup::Start, &[]).await?;
    println!("starting position set, analyzing...");

    engine.go_infinite(|info| println!("{info}")).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let best = engine.stop().await?;
    match best.mv {
        Some(mv) => println!("bestmove: {mv}"),
        None => println!("no legal move"),
    }

    let shutdown = engine.quit().await?;
    println!("engine pid {} exited: {}", shutdown.pid, shutdown.status);
    Ok(())
}
