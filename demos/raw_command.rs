//! Send a raw passthrough command to an engine.
//!
//! ```sh
//! cargo run --example raw_command -- /path/to/stockfish isready
//! ```

use uciwire::Engine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "stockfish".to_string());
    let command = args.next().unwrap_or_else(|| "isready".to_string());

    let engine = Engine::spawn(&path, std::iter::empty::<&str>()).await?;

    let identity = engine.handshake().await?;
    println!(
        "engine: {}",
        identity.name.as_deref().unwrap_or("unknown")
    );

    let reply = engine.send_raw(&command).await?;
    println!("{reply}");

    engine.quit().await?;
    Ok(())
}
