//! Line splitting for streamed output.
//!
//! A [`LineSplitter`] turns arbitrary byte chunks into complete lines,
//! keeping any unterminated tail around for the next chunk.

/// Splits a byte stream on `\n`.
///
/// Every complete line in a chunk is returned by the same [`feed`] call.
/// Lines never include the newline; invalid UTF-8 is replaced rather than
/// rejected, since monitored programs write whatever they like.
///
/// # Example
///
/// ```
/// use kwikemon::LineSplitter;
///
/// let mut lines = LineSplitter::new();
/// assert_eq!(lines.feed(b"complete\nincom"), vec!["complete"]);
/// assert_eq!(lines.feed(b"plete\n"), vec!["incomplete"]);
/// assert_eq!(lines.finish(), None);
/// ```
///
/// [`feed`]: LineSplitter::feed
#[derive(Debug, Default, Clone)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the lines it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        if chunk.is_empty() {
            return lines;
        }

        self.buffer.extend_from_slice(chunk);

        // Only the new bytes can contain a newline; everything buffered
        // before this call was an unterminated tail.
        let mut start = 0;
        let mut search_from = self.buffer.len() - chunk.len();
        while let Some(offset) = self.buffer[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + offset;
            lines.push(String::from_utf8_lossy(&self.buffer[start..end]).into_owned());
            start = end + 1;
            search_from = start;
        }
        self.buffer.drain(..start);

        lines
    }

    /// Flush the unterminated tail at end of stream.
    ///
    /// Returns `None` when nothing is buffered.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(line)
    }

    /// Bytes received since the last newline.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_lines_are_carried_over() {
        let mut lines = LineSplitter::new();
        assert_eq!(lines.feed(b"complete\n"), vec!["complete"]);
        assert!(lines.feed(b"incom").is_empty());
        assert_eq!(lines.pending(), b"incom");
        assert_eq!(lines.feed(b"plete\n"), vec!["incomplete"]);
        assert!(lines.pending().is_empty());
    }

    #[test]
    fn test_empty_chunk() {
        let mut lines = LineSplitter::new();
        lines.feed(b"abc");
        assert!(lines.feed(b"").is_empty());
        assert_eq!(lines.pending(), b"abc");
    }

    #[test]
    fn test_lone_newline_is_empty_line() {
        let mut lines = LineSplitter::new();
        assert_eq!(lines.feed(b"\n"), vec![""]);
    }

    #[test]
    fn test_many_lines_in_one_chunk() {
        let mut lines = LineSplitter::new();
        assert_eq!(lines.feed(b"a\nb\n\nc"), vec!["a", "b", ""]);
        assert_eq!(lines.finish(), Some("c".to_string()));
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn test_carriage_returns_are_kept() {
        let mut lines = LineSplitter::new();
        assert_eq!(lines.feed(b"dos\r\n"), vec!["dos\r"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut lines = LineSplitter::new();
        let out = lines.feed(b"caf\xc3\n\xff\n");
        assert_eq!(out, vec!["caf\u{fffd}", "\u{fffd}"]);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let mut lines = LineSplitter::new();
        assert!(lines.feed(b"caf\xc3").is_empty());
        assert_eq!(lines.feed(b"\xa9\n"), vec!["café"]);
    }
}
