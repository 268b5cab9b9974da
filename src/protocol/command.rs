//! Outbound command serialization.
//!
//! Each protocol command is a value whose `Display` impl produces the
//! exact line written to the engine's stdin. The session appends a single
//! `\n` when writing; commands never embed terminators themselves.

use std::fmt;
use std::time::Duration;

/// Board setup for a `position` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setup {
    /// `position startpos`
    Start,
    /// `position fen <FEN>` — the FEN text is passed through verbatim.
    Fen(String),
}

/// An outbound UCI command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Uci,
    IsReady,
    SetOption {
        name: String,
        value: Option<String>,
    },
    NewGame,
    Position {
        setup: Setup,
        /// Moves played from the setup, as opaque algebraic tokens.
        moves: Vec<String>,
    },
    /// `go wtime <W> btime <B>` with remaining clock times.
    GoClock {
        wtime: Duration,
        btime: Duration,
    },
    GoInfinite,
    Stop,
    Quit,
    /// Caller-supplied passthrough text, written as-is.
    Raw(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Uci => f.write_str("uci"),
            Command::IsReady => f.write_str("isready"),
            Command::SetOption { name, value } => {
                write!(f, "setoption name {name}")?;
                if let Some(value) = value {
                    write!(f, " value {value}")?;
                }
                Ok(())
            }
            Command::NewGame => f.write_str("ucinewgame"),
            Command::Position { setup, moves } => {
                match setup {
                    Setup::Start => f.write_str("position startpos")?,
                    Setup::Fen(fen) => write!(f, "position fen {fen}")?,
                }
                if !moves.is_empty() {
                    f.write_str(" moves")?;
                    for m in moves {
                        write!(f, " {m}")?;
                    }
                }
                Ok(())
            }
            Command::GoClock { wtime, btime } => {
                write!(
                    f,
                    "go wtime {} btime {}",
                    wtime.as_millis(),
                    btime.as_millis()
                )
            }
            Command::GoInfinite => f.write_str("go infinite"),
            Command::Stop => f.write_str("stop"),
            Command::Quit => f.write_str("quit"),
            Command::Raw(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_commands() {
        assert_eq!(Command::Uci.to_string(), "uci");
        assert_eq!(Command::IsReady.to_string(), "isready");
        assert_eq!(Command::NewGame.to_string(), "ucinewgame");
        assert_eq!(Command::GoInfinite.to_string(), "go infinite");
        assert_eq!(Command::Stop.to_string(), "stop");
        assert_eq!(Command::Quit.to_string(), "quit");
    }

    #[test]
    fn test_setoption() {
        assert_eq!(
            Command::SetOption {
                name: "Hash".into(),
                value: Some("128".into()),
            }
            .to_string(),
            "setoption name Hash value 128"
        );
        assert_eq!(
            Command::SetOption {
                name: "Clear Hash".into(),
                value: None,
            }
            .to_string(),
            "setoption name Clear Hash"
        );
    }

    #[test]
    fn test_position() {
        assert_eq!(
            Command::Position {
                setup: Setup::Start,
                moves: vec![],
            }
            .to_string(),
            "position startpos"
        );
        assert_eq!(
            Command::Position {
                setup: Setup::Start,
                moves: vec!["e2e4".into(), "e7e5".into()],
            }
            .to_string(),
            "position startpos moves e2e4 e7e5"
        );
        assert_eq!(
            Command::Position {
                setup: Setup::Fen("8/8/8/8/8/8/8/K6k w - - 0 1".into()),
                moves: vec![],
            }
            .to_string(),
            "position fen 8/8/8/8/8/8/8/K6k w - - 0 1"
        );
    }

    #[test]
    fn test_go_clock_millis() {
        assert_eq!(
            Command::GoClock {
                wtime: Duration::from_millis(300_000),
                btime: Duration::from_secs(120),
            }
            .to_string(),
            "go wtime 300000 btime 120000"
        );
    }

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(Command::Raw("d".into()).to_string(), "d");
    }
}
