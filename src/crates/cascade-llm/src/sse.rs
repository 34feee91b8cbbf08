//! Line decoding for streamed response bodies.
//!
//! Both SSE (`data:`-prefixed lines) and NDJSON arrive as newline-delimited
//! text, but one network read can end mid-line. [`LineBuffer`] accumulates
//! raw bytes and hands back only complete lines, carrying the unfinished
//! tail over to the next read.

/// Accumulates streamed bytes and yields complete lines.
pub(crate) struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Append raw bytes from the network.
    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
    }

    /// Next complete line, trimmed, skipping blank lines.
    ///
    /// Returns `None` once only a partial line remains buffered.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        None
    }
}

/// The payload of an SSE `data:` line, or `None` for any other line
/// (event names, comments, keep-alives).
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|rest| rest.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_lines_come_out_in_order() {
        let mut lines = LineBuffer::new();
        lines.push(b"data: one\ndata: two\n");

        assert_eq!(lines.next_line().as_deref(), Some("data: one"));
        assert_eq!(lines.next_line().as_deref(), Some("data: two"));
        assert_eq!(lines.next_line(), None);
    }

    #[test]
    fn test_partial_line_carries_over_between_reads() {
        let mut lines = LineBuffer::new();
        lines.push(b"data: {\"text\": \"hel");
        assert_eq!(lines.next_line(), None);

        lines.push(b"lo\"}\n");
        assert_eq!(
            lines.next_line().as_deref(),
            Some("data: {\"text\": \"hello\"}")
        );
    }

    #[test]
    fn test_blank_and_crlf_lines_are_skipped() {
        let mut lines = LineBuffer::new();
        lines.push(b"\r\n\ndata: x\r\n\n");

        assert_eq!(lines.next_line().as_deref(), Some("data: x"));
        assert_eq!(lines.next_line(), None);
    }

    #[test]
    fn test_sse_data_extraction() {
        assert_eq!(sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(sse_data("data:[DONE]"), Some("[DONE]"));
        assert_eq!(sse_data("event: message_stop"), None);
        assert_eq!(sse_data(": keep-alive"), None);
    }
}
