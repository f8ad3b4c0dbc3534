//! Output sanitization for stripping ANSI escape codes.

use vte::{Params, Parser, Perform};

/// Stateful ANSI stripper for a stream of PTY output.
///
/// Escape sequences and multi-byte characters may be split across reads;
/// the parser state carries over between calls to [`feed`](Self::feed).
pub struct OutputSanitizer {
    parser: Parser,
    extractor: PlainTextExtractor,
}

impl OutputSanitizer {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            extractor: PlainTextExtractor::new(),
        }
    }

    /// Feed raw bytes, returning the plain text they complete.
    pub fn feed(&mut self, input: &[u8]) -> String {
        self.parser.advance(&mut self.extractor, input);
        self.extractor.take_string()
    }

    /// Strip ANSI escape codes from a complete buffer.
    pub fn strip_ansi(input: &[u8]) -> String {
        Self::new().feed(input)
    }

    /// Strip ANSI codes from a string.
    pub fn strip_ansi_str(input: &str) -> String {
        Self::strip_ansi(input.as_bytes())
    }
}

impl Default for OutputSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// VTE performer that extracts plain text.
struct PlainTextExtractor {
    output: Vec<u8>,
}

impl PlainTextExtractor {
    fn new() -> Self {
        Self { output: Vec::new() }
    }

    fn take_string(&mut self) -> String {
        let bytes = std::mem::take(&mut self.output);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Perform for PlainTextExtractor {
    fn print(&mut self, c: char) {
        let mut buf = [0u8; 4];
        let encoded = c.encode_utf8(&mut buf);
        self.output.extend_from_slice(encoded.as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            // Newline, carriage return, tab
            0x0A | 0x0D | 0x09 => self.output.push(byte),
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(
        &mut self,
        _params: &Params,
        _intermediates: &[u8],
        _ignore: bool,
        _action: char,
    ) {
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}
