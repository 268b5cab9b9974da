//! # uciwire
//!
//! Async client for driving UCI chess engines as child processes.
//!
//! The engine speaks a line-oriented text protocol over its standard
//! streams; this crate hides the partial-line buffering, response
//! termination detection, and streamed search output behind per-command
//! futures.
//!
//! ## Architecture
//!
//! - **Line framer**: reassembles raw pipe reads into complete lines
//! - **Classifier**: tags each line (`id`, `option`, `info`, `bestmove`,
//!   `readyok`, `uciok`, other)
//! - **Correlator**: a FIFO of pending commands; only the head is matched
//!   against incoming lines, so replies resolve strictly in issuance order
//! - **Facade**: [`Engine`], one method per protocol operation
//!
//! ## Example
//!
//! ```ignore
//! use uciwire::Engine;
//!
//! #[tokio::main]
//! async fn main() -> uciwire::Result<()> {
//!     let engine = Engine::spawn("stockfish", &[]).await?;
//!     let identity = engine.handshake().await?;
//!     println!("talking to {}", identity.name.unwrap_or_default());
//!     engine.quit().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod protocol;

mod engine;
mod session;

pub use engine::Engine;
pub use error::{Result, UciError};
pub use protocol::{BestMove, Command, Move, Setup};
pub use session::{EngineIdentity, InfoHandler, Shutdown};
