//! Line buffer for accumulating partial reads.
//!
//! UCI engines write one logical line at a time, but pipe reads deliver
//! arbitrary byte chunks. The buffer accumulates chunks in a
//! `bytes::BytesMut` and yields complete lines as they terminate; the
//! unterminated tail stays buffered as the carry for the next push.
//!
//! # Example
//!
//! ```
//! use uciwire::protocol::LineBuffer;
//!
//! let mut buffer = LineBuffer::new();
//! assert!(buffer.push(b"ready").is_empty());
//! assert_eq!(buffer.push(b"ok\n"), vec!["readyok".to_string()]);
//! ```

use bytes::BytesMut;
use memchr::memchr;

/// Buffer for reassembling raw byte chunks into complete protocol lines.
///
/// Lines are terminated by `\n`; a trailing `\r` is stripped so both
/// `\n` and `\r\n` conventions are accepted regardless of the host
/// platform. Every byte pushed ends up in exactly one line, in arrival
/// order.
#[derive(Debug, Default)]
pub struct LineBuffer {
    /// Accumulated bytes not yet terminated into a line (the carry).
    carry: BytesMut,
}

impl LineBuffer {
    /// Create an empty line buffer.
    pub fn new() -> Self {
        Self {
            carry: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Push a chunk and extract all complete lines.
    ///
    /// Returns the lines completed by this chunk, in order. A chunk with
    /// no terminator yields an empty vec and grows the carry. Invalid
    /// UTF-8 is replaced lossily; the protocol is ASCII in practice.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = memchr(b'\n', &self.carry) {
            let mut line = self.carry.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Number of carried bytes awaiting a terminator.
    pub fn carry_len(&self) -> usize {
        self.carry.len()
    }

    /// Check whether the carry is empty.
    pub fn is_empty(&self) -> bool {
        self.carry.is_empty()
    }
}
