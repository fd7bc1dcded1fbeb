//! Reply decoding
//!
//! Inbound bytes are buffered until a line terminator (`\r` or `\n`) shows up,
//! so replies split across reads or merged into one read decode the same way.

use bytes::BytesMut;
use tracing::{trace, warn};

/// Longest unterminated line kept before the rest of it is discarded
pub const MAX_LINE_LEN: usize = 64;

/// A decoded reply line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Channel value; `on`/`off` decode to 1/0
    Value(i32),
    /// Text that is neither a value, an echo nor a prompt
    Malformed(String),
}

/// Streaming reply decoder that handles partial data
#[derive(Debug, Default)]
pub struct ResponseParser {
    buffer: BytesMut,
    /// Inside an overlong line; skip up to its terminator
    discarding: bool,
}

impl ResponseParser {
    /// Create new parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Add data and return every complete reply
    pub fn push(&mut self, data: &[u8]) -> Vec<Reply> {
        self.buffer.extend_from_slice(data);

        let mut replies = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| matches!(b, b'\r' | b'\n')) {
            let line = self.buffer.split_to(pos + 1);
            if self.discarding {
                trace!("Dropped tail of overlong line ({} bytes)", pos);
                self.discarding = false;
                continue;
            }
            if let Some(reply) = decode_line(&line[..pos]) {
                replies.push(reply);
            }
        }

        if self.discarding {
            self.buffer.clear();
        } else if self.buffer.len() > MAX_LINE_LEN {
            warn!(
                "Discarding overlong reply line ({} bytes so far)",
                self.buffer.len()
            );
            self.buffer.clear();
            self.discarding = true;
        }

        replies
    }

    /// Bytes waiting for a terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop an unterminated partial line and return its text, if it held
    /// anything besides whitespace and the prompt
    pub fn flush_partial(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = self.buffer.split();
        let text = String::from_utf8_lossy(&raw);
        let text = text.trim().trim_start_matches('>').trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    /// Clear buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}

fn decode_line(raw: &[u8]) -> Option<Reply> {
    let text = String::from_utf8_lossy(raw);
    // The board prefixes its output with a `>` prompt.
    let text = text.trim().trim_start_matches('>').trim();
    if text.is_empty() {
        return None;
    }

    if is_echo(text) {
        trace!("Skipping command echo {:?}", text);
        return None;
    }

    let reply = match text.to_ascii_lowercase().as_str() {
        "on" => Reply::Value(1),
        "off" => Reply::Value(0),
        other => other
            .parse::<i32>()
            .map_or_else(|_| Reply::Malformed(text.to_string()), Reply::Value),
    };
    Some(reply)
}

fn is_echo(text: &str) -> bool {
    matches!(text.split_whitespace().next(), Some("relay" | "gpio"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_whitespace() {
        let mut parser = ResponseParser::new();
        assert_eq!(parser.push(b"  42\r\n"), vec![Reply::Value(42)]);
        assert_eq!(parser.pending(), 0);
    }

    #[test]
    fn test_buffers_partial_reply() {
        let mut parser = ResponseParser::new();
        assert!(parser.push(b"1").is_empty());
        assert!(parser.push(b"7").is_empty());
        assert_eq!(parser.pending(), 2);
        assert_eq!(parser.push(b"\r\n"), vec![Reply::Value(17)]);
    }

    #[test]
    fn test_merged_replies() {
        let mut parser = ResponseParser::new();
        assert_eq!(
            parser.push(b"1\r\n0\r\n-3\n"),
            vec![Reply::Value(1), Reply::Value(0), Reply::Value(-3)]
        );
    }

    #[test]
    fn test_board_words_echo_and_prompt() {
        let mut parser = ResponseParser::new();
        let replies = parser.push(b"relay read 0\n\ron\n\r>relay read 1\n\rOFF\n\r>");
        assert_eq!(replies, vec![Reply::Value(1), Reply::Value(0)]);
        // A trailing prompt waits for its line end and then decodes to nothing.
        assert_eq!(parser.pending(), 1);
        assert!(parser.push(b"\r").is_empty());
    }

    #[test]
    fn test_malformed_is_reported() {
        let mut parser = ResponseParser::new();
        assert_eq!(
            parser.push(b"abc\r\n"),
            vec![Reply::Malformed("abc".to_string())]
        );
    }

    #[test]
    fn test_unterminated_garbage_yields_nothing() {
        let mut parser = ResponseParser::new();
        assert!(parser.push(b"abc").is_empty());
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut parser = ResponseParser::new();
        assert!(parser.push(&[b'9'; MAX_LINE_LEN + 1]).is_empty());
        assert_eq!(parser.pending(), 0);
        // Still the same line until its terminator.
        assert!(parser.push(b"99").is_empty());
        assert_eq!(parser.pending(), 0);
        assert!(parser.push(b"5\r").is_empty());
        assert_eq!(parser.push(b"\n7\r"), vec![Reply::Value(7)]);
    }

    #[test]
    fn test_overlong_line_tail_in_same_read() {
        let mut parser = ResponseParser::new();
        assert!(parser.push(&[b'x'; MAX_LINE_LEN + 2]).is_empty());
        assert_eq!(parser.push(b"17\r3\r"), vec![Reply::Value(3)]);

        let mut parser = ResponseParser::new();
        assert!(parser.push(&[b'x'; MAX_LINE_LEN + 2]).is_empty());
        assert!(parser.push(b"17\r").is_empty());
    }

    #[test]
    fn test_clear_ends_discarding() {
        let mut parser = ResponseParser::new();
        parser.push(&[b'x'; MAX_LINE_LEN + 1]);
        parser.clear();
        assert_eq!(parser.push(b"4\r"), vec![Reply::Value(4)]);
    }

    #[test]
    fn test_flush_partial() {
        let mut parser = ResponseParser::new();
        parser.push(b"abc");
        assert_eq!(parser.flush_partial().as_deref(), Some("abc"));
        assert_eq!(parser.pending(), 0);
        assert_eq!(parser.push(b"42\r\n"), vec![Reply::Value(42)]);

        parser.push(b"\n\r>");
        assert_eq!(parser.flush_partial(), None);
        assert_eq!(parser.pending(), 0);
    }
}
