//! Move token extraction.
//!
//! The client treats moves as opaque long-algebraic tokens: two characters
//! of origin square, two of destination, an optional promotion letter. No
//! legality checking is done here.

use std::fmt;

use crate::error::UciError;

/// A move in long algebraic notation, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    /// Origin square, e.g. `e2`.
    pub from: String,
    /// Destination square, e.g. `e4`.
    pub to: String,
    /// Promotion piece letter, e.g. `q` for `e7e8q`.
    pub promotion: Option<char>,
}

impl Move {
    /// Parse a move token from a `bestmove` line.
    ///
    /// The literal `(none)` maps to `Ok(None)`: the engine found no legal
    /// move (mate or stalemate position). Any token that is not `(none)`
    /// or a 4/5 character square pair is a format violation.
    pub fn parse(token: &str) -> Result<Option<Move>, UciError> {
        if token == "(none)" {
            return Ok(None);
        }

        let chars: Vec<char> = token.chars().collect();
        if !matches!(chars.len(), 4 | 5) || !chars.iter().all(|c| c.is_ascii_alphanumeric()) {
            return Err(UciError::Format(token.to_string()));
        }

        Ok(Some(Move {
            from: chars[..2].iter().collect(),
            to: chars[2..4].iter().collect(),
            promotion: chars.get(4).copied(),
        }))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promotion {
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

/// Result of a search: the move the engine chose, plus the move it would
/// ponder on if the engine offered one.
///
/// `mv` is `None` when the engine reported `bestmove (none)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMove {
    pub mv: Option<Move>,
    pub ponder: Option<Move>,
}
