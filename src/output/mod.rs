//! Output processing.
//!
//! PTY transports receive terminal output: colors, titles and cursor
//! movement mixed in with the text a command printed. [`OutputSanitizer`]
//! strips those escape sequences incrementally so chunks can be streamed as
//! they arrive.
//!
//! # Example
//!
//! ```
//! use ssh_session::output::OutputSanitizer;
//!
//! let clean = OutputSanitizer::strip_ansi(b"\x1b[31mRed text\x1b[0m");
//! assert_eq!(clean, "Red text");
//!
//! let mut stream = OutputSanitizer::new();
//! let mut text = stream.feed(b"\x1b[3");
//! text.push_str(&stream.feed(b"2mgreen"));
//! assert_eq!(text, "green");
//! ```

mod sanitizer;

pub use sanitizer::OutputSanitizer;
