//! Error types for uciwire.

use thiserror::Error;

/// Main error type for all engine client operations.
#[derive(Debug, Error)]
pub enum UciError {
    /// I/O error on the child process pipes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine wrote to stderr before producing any output.
    ///
    /// Signals that the executable failed to launch or errored immediately.
    #[error("engine failed to start: {0}")]
    Startup(String),

    /// The engine wrote to stderr while a command was pending.
    ///
    /// Carries the raw diagnostic text; the pending command is rejected.
    #[error("engine reported an error: {0}")]
    Process(String),

    /// A terminal-prefixed line failed its expected grammar
    /// (e.g. `bestmove` present but malformed).
    #[error("malformed engine output: {0:?}")]
    Format(String),

    /// An unbounded search is already running.
    ///
    /// Only one `go infinite` subscription may be active at a time; the
    /// previous one must be torn down by `stop` first.
    #[error("an unbounded search is already active")]
    SearchActive,

    /// The engine process closed while a command was still pending.
    #[error("engine process terminated")]
    Terminated,

    /// The session is shut down; no further commands can be issued.
    #[error("engine session closed")]
    Closed,
}

/// Result type alias using UciError.
pub type Result<T> = std::result::Result<T, UciError>;
