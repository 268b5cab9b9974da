//! Wire-level protocol handling: line framing, classification, and
//! outbound command serialization.

mod classify;
mod command;
mod line_buffer;
mod moves;

pub use classify::{classify, EngineLine};
pub use command::{Command, Setup};
pub use line_buffer::LineBuffer;
pub use moves::{BestMove, Move};
