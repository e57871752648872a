//! Accumulating output buffer with a bounded prompt-search window.
//!
//! Prompts only ever appear at the end of a response, so pattern checks
//! run against the last `search_window` bytes rather than the whole
//! accumulated output. For large outputs (full routing tables, log
//! dumps) this keeps per-chunk matching cost constant.

use std::borrow::Cow;

use bytes::BytesMut;
use regex::bytes::Regex;

/// Buffer that accumulates shell output and searches its tail for prompts.
///
/// ANSI escape sequences are stripped on the way in; the appliance PTY
/// emits them even for plain command output, and they would otherwise
/// break substring and prompt matching.
#[derive(Debug)]
pub struct OutputBuffer {
    data: BytesMut,
    search_window: usize,
}

impl OutputBuffer {
    /// Create a buffer that searches the last `search_window` bytes.
    pub fn new(search_window: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(4096),
            search_window,
        }
    }

    /// Append a chunk of raw output, stripping ANSI escape sequences.
    pub fn push(&mut self, chunk: &[u8]) {
        let cleaned = strip_ansi_escapes::strip(chunk);
        self.data.extend_from_slice(&cleaned);
    }

    /// Whether the tail of the buffer matches `pattern`.
    pub fn matches_tail(&self, pattern: &Regex) -> bool {
        pattern.is_match(self.tail())
    }

    /// The matched prompt text at the tail, if any.
    pub fn tail_match_text(&self, pattern: &Regex) -> Option<String> {
        pattern
            .find(self.tail())
            .map(|m| String::from_utf8_lossy(m.as_bytes()).to_string())
    }

    /// Accumulated output as text (lossy UTF-8).
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Take the accumulated output as text, resetting the buffer.
    pub fn take_text(&mut self) -> String {
        let data = self.data.split();
        String::from_utf8_lossy(&data).to_string()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn tail(&self) -> &[u8] {
        let start = self.data.len().saturating_sub(self.search_window);
        &self.data[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ansi_sequences() {
        let mut buffer = OutputBuffer::new(100);
        buffer.push(b"\x1b[1;32mgw-1>\x1b[0m ");
        assert_eq!(buffer.text(), "gw-1> ");
    }

    #[test]
    fn tail_search_is_windowed() {
        let mut buffer = OutputBuffer::new(16);
        buffer.push(b"gw-1> ");
        buffer.push(&[b'x'; 64]);

        // The prompt scrolled out of the search window.
        let pattern = Regex::new(r"gw-1>").unwrap();
        assert!(!buffer.matches_tail(&pattern));

        buffer.push(b"\ngw-1> ");
        assert!(buffer.matches_tail(&pattern));
    }

    #[test]
    fn tail_match_text_extracts_prompt() {
        let mut buffer = OutputBuffer::new(100);
        buffer.push(b"uptime 4 days\r\n[Expert@gw-1:0]# ");

        let pattern = Regex::new(r"(?m)^\[Expert@[^\]]+\]#\s*$").unwrap();
        assert_eq!(
            buffer.tail_match_text(&pattern).as_deref(),
            Some("[Expert@gw-1:0]# ")
        );
    }

    #[test]
    fn take_text_resets() {
        let mut buffer = OutputBuffer::new(100);
        buffer.push(b"partial output");
        assert_eq!(buffer.take_text(), "partial output");
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }
}
