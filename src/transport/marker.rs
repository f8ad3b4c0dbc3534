//! Completion markers for commands run in a persistent shell.
//!
//! An interactive shell never signals that a command finished, so every
//! command is followed by a line printing a unique token and `$?`. The token
//! is printed from two halves so an echoed copy of the line never matches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const PREFIX: &str = "__SSHS_";

static COUNTER: AtomicU64 = AtomicU64::new(1);

/// A unique token that marks the end of one command's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Marker {
    suffix: String,
}

impl Marker {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            suffix: format!("{:x}_{}__", nanos, seq),
        }
    }

    /// The full token as it appears in output.
    pub fn token(&self) -> String {
        format!("{}{}", PREFIX, self.suffix)
    }

    /// Shell line printing the token followed by the previous command's status.
    pub fn status_line(&self) -> String {
        format!("printf '%s%s%d\\n' '{}' '{}' \"$?\"", PREFIX, self.suffix)
    }

    /// Shell line printing the token followed by a zero status.
    pub fn ready_line(&self) -> String {
        format!("printf '%s%s0\\n' '{}' '{}'", PREFIX, self.suffix)
    }
}

/// Splits a stream of decoded output at a marker.
#[derive(Debug)]
pub(crate) struct MarkerScanner {
    token: String,
    pending: String,
}

/// Result of feeding text to a [`MarkerScanner`].
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Scanned {
    /// Output that definitely precedes the marker.
    pub output: String,
    /// Raw status printed after the marker, once the whole line arrived.
    pub status: Option<String>,
    /// Text that followed the status line in the same feed.
    pub rest: String,
}

impl MarkerScanner {
    pub fn new(marker: &Marker) -> Self {
        Self {
            token: marker.token(),
            pending: String::new(),
        }
    }

    /// Feed decoded text. Text after the status line lands in `rest`.
    pub fn feed(&mut self, text: &str) -> Scanned {
        self.pending.push_str(text);

        if let Some(idx) = self.pending.find(&self.token) {
            let output = self.pending[..idx].to_string();
            let after = &self.pending[idx + self.token.len()..];

            return match after.find('\n') {
                Some(nl) => {
                    let status = after[..nl].trim().to_string();
                    let rest = after[nl + 1..].to_string();
                    self.pending.clear();
                    Scanned {
                        output,
                        status: Some(status),
                        rest,
                    }
                }
                None => {
                    self.pending.drain(..idx);
                    Scanned {
                        output,
                        ..Scanned::default()
                    }
                }
            };
        }

        // Keep back a tail that could be the start of a split token. The token
        // is ASCII, so the split point is always a char boundary.
        let keep = (1..self.token.len())
            .rev()
            .find(|&k| self.pending.ends_with(&self.token[..k]))
            .unwrap_or(0);
        let emit_len = self.pending.len() - keep;
        let output: String = self.pending.drain(..emit_len).collect();

        Scanned {
            output,
            ..Scanned::default()
        }
    }

    /// Give up on the marker and release whatever is held back.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }

    /// Text held back so far.
    #[cfg(test)]
    pub fn pending(&self) -> &str {
        &self.pending
    }
}
