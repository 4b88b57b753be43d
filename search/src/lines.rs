//! Incremental line decoding for subprocess output.

/// Splits a byte stream into lines without losing data at chunk boundaries.
///
/// Bytes are buffered until a `\n` arrives, so a UTF-8 sequence split across reads is
/// only decoded once it is whole. A trailing `\r` is removed, making `\r\n` and `\n`
/// equivalent. Empty lines are dropped.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.extend(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush the unterminated tail once the stream has closed.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

fn decode_line(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::LineDecoder;

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = LineDecoder::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(decoder.push(chunk));
        }
        lines.extend(decoder.finish());
        lines
    }

    #[test]
    fn splits_on_lf_and_crlf() {
        let lines = decode_all(&[b"a.rs\r\nb.rs\nc.rs\r\n"]);
        assert_eq!(lines, ["a.rs", "b.rs", "c.rs"]);
    }

    #[test]
    fn yields_trailing_partial_line_on_finish() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"first\nsec"), ["first"]);
        assert!(decoder.push(b"ond").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("second"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn skips_empty_lines() {
        assert_eq!(decode_all(&[b"\n\r\nx\n\n"]), ["x"]);
    }

    #[test]
    fn every_split_offset_matches_unsplit_decode() {
        let input = "src/héllo.rs\r\n日本/語.txt\nemoji/🦀.md\ntail/ß".as_bytes();
        let expected = decode_all(&[input]);
        assert_eq!(expected.len(), 4);

        for offset in 0..=input.len() {
            let (head, tail) = input.split_at(offset);
            assert_eq!(decode_all(&[head, tail]), expected, "split at byte {offset}");
        }
    }

    #[test]
    fn byte_at_a_time_matches_unsplit_decode() {
        let input = "ä\nö\r\nü".as_bytes();
        let chunks: Vec<&[u8]> = input.chunks(1).collect();
        assert_eq!(decode_all(&chunks), ["ä", "ö", "ü"]);
    }
}
