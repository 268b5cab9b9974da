//! Line classification.
//!
//! Every complete line from the engine is tagged exactly once, before the
//! correlator decides what to do with it. Classification is a pure, total
//! function: unrecognized lines become [`EngineLine::Other`], never an
//! error.

use crate::protocol::moves::{BestMove, Move};

/// A classified engine output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    /// `id name <name>`
    IdName(String),
    /// `id author <author>`
    IdAuthor(String),
    /// `option ...` — raw description text, not further parsed.
    Option(String),
    /// `info ...` — raw search info text.
    Info(String),
    /// `bestmove <move> [ponder <move>]`
    BestMove(BestMove),
    /// A line starting with `bestmove` that does not match the grammar.
    ///
    /// Surfaced as a distinguishable defect rather than silently dropped.
    MalformedBestMove(String),
    /// `readyok`
    ReadyOk,
    /// `uciok`
    UciOk,
    /// Anything else (banners, unknown tokens).
    Other(String),
}

/// Classify a single complete line of engine output.
pub fn classify(line: &str) -> EngineLine {
    let trimmed = line.trim_end();

    match trimmed {
        "uciok" => return EngineLine::UciOk,
        "readyok" => return EngineLine::ReadyOk,
        _ => {}
    }

    if let Some(name) = strip_word(trimmed, "id name") {
        return EngineLine::IdName(name.to_string());
    }
    if let Some(author) = strip_word(trimmed, "id author") {
        return EngineLine::IdAuthor(author.to_string());
    }
    if is_word_prefixed(trimmed, "option") {
        return EngineLine::Option(trimmed.to_string());
    }
    if is_word_prefixed(trimmed, "info") {
        return EngineLine::Info(trimmed.to_string());
    }
    if is_word_prefixed(trimmed, "bestmove") {
        return match parse_bestmove(trimmed) {
            Some(best) => EngineLine::BestMove(best),
            None => EngineLine::MalformedBestMove(trimmed.to_string()),
        };
    }

    EngineLine::Other(trimmed.to_string())
}

/// Parse `bestmove <move> [ponder <move>]`. Returns `None` on any
/// deviation from the grammar.
fn parse_bestmove(line: &str) -> Option<BestMove> {
    let mut tokens = line.split_ascii_whitespace();
    if tokens.next() != Some("bestmove") {
        return None;
    }

    let mv = Move::parse(tokens.next()?).ok()?;

    // `ponder (none)` is a valid engine utterance meaning "nothing to
    // ponder"; it parses to an absent ponder move, not a violation.
    let ponder = match tokens.next() {
        Some("ponder") => Move::parse(tokens.next()?).ok()?,
        Some(_) => return None,
        None => None,
    };
    if tokens.next().is_some() {
        return None;
    }

    Some(BestMove { mv, ponder })
}

/// True if `line` is exactly `prefix` or `prefix` followed by whitespace.
fn is_word_prefixed(line: &str, prefix: &str) -> bool {
    match line.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

/// Strip a word prefix and the whitespace after it, yielding the payload.
fn strip_word<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_start())
}
