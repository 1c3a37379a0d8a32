//! Line Splitter
//!
//! Chunk boundaries rarely line up with line boundaries. The splitter keeps
//! the unterminated tail of the input (the carry) between chunks and only
//! splits on complete delimiter occurrences, so a multi-byte delimiter or
//! a multi-byte character split across chunks is reassembled before use.
//!
//! Lines are emitted as text when they decode as UTF-8, binary otherwise.

use log::debug;

use super::{Chunk, StageState, StreamError, Transform};
use crate::config::ConfigError;

/// Platform line ending
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
/// Platform line ending
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// Reassembles a chunk stream into line records
#[derive(Debug)]
pub struct LineSplitter {
    /// Line terminator, never empty
    delimiter: Vec<u8>,
    /// Input after the last emitted terminator
    carry: Vec<u8>,
    /// Lines emitted so far
    lines_emitted: usize,
    state: StageState,
}

impl LineSplitter {
    /// Split on the platform line ending
    pub fn new() -> Self {
        Self::from_delimiter(LINE_ENDING.as_bytes().to_vec())
    }

    /// Split on a custom delimiter
    pub fn with_delimiter(delimiter: &str) -> Result<Self, ConfigError> {
        if delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        Ok(Self::from_delimiter(delimiter.as_bytes().to_vec()))
    }

    fn from_delimiter(delimiter: Vec<u8>) -> Self {
        Self {
            delimiter,
            carry: Vec::with_capacity(256),
            lines_emitted: 0,
            state: StageState::Open,
        }
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// Unterminated fragment waiting for more input
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    pub fn lines_emitted(&self) -> usize {
        self.lines_emitted
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    fn emit(&mut self, line: Vec<u8>, out: &mut Vec<Chunk>) {
        self.lines_emitted += 1;
        out.push(Chunk::from_bytes(line));
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for LineSplitter {
    fn process_into(&mut self, chunk: Chunk, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        if self.state.is_terminal() {
            return Err(StreamError::Closed);
        }
        if chunk.is_empty() {
            return Ok(());
        }

        // The carry holds no complete delimiter, so a new match can start
        // at most `delimiter.len() - 1` bytes before its end.
        let mut cursor = self
            .carry
            .len()
            .saturating_sub(self.delimiter.len() - 1);
        self.carry.extend_from_slice(chunk.as_bytes());

        let emitted_before = self.lines_emitted;
        let mut line_start = 0;
        while let Some(pos) = find(&self.carry[cursor..], &self.delimiter) {
            let line_end = cursor + pos;
            let line = self.carry[line_start..line_end].to_vec();
            self.emit(line, out);
            line_start = line_end + self.delimiter.len();
            cursor = line_start;
        }
        self.carry.drain(..line_start);

        debug!(
            "Split {} line(s), {} byte(s) carried",
            self.lines_emitted - emitted_before,
            self.carry.len()
        );
        Ok(())
    }

    fn finish_into(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.state = StageState::Finished;

        if !self.carry.is_empty() {
            let last = std::mem::take(&mut self.carry);
            self.emit(last, out);
        }
        Ok(())
    }
}

/// First occurrence of `needle` in `haystack`
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter() -> LineSplitter {
        LineSplitter::with_delimiter("\n").unwrap()
    }

    fn feed(splitter: &mut LineSplitter, chunks: &[&str]) -> Vec<String> {
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(splitter.process(Chunk::from(*chunk)).unwrap());
        }
        lines.extend(splitter.finish().unwrap());
        lines
            .into_iter()
            .map(|c| c.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_line_across_chunks() {
        let mut s = splitter();
        let lines = feed(&mut s, &["ab", "c\nde", "f"]);
        assert_eq!(lines, vec!["abc", "def"]);
    }

    #[test]
    fn test_carry_between_chunks() {
        let mut s = splitter();

        assert!(s.process(Chunk::from("ab")).unwrap().is_empty());
        assert_eq!(s.pending(), b"ab");

        let out = s.process(Chunk::from("c\nde")).unwrap();
        assert_eq!(out, vec![Chunk::from("abc")]);
        assert_eq!(s.pending(), b"de");
    }

    #[test]
    fn test_chunk_of_only_delimiters() {
        let mut s = splitter();
        let lines = feed(&mut s, &["a\n", "\n\n", "b"]);
        assert_eq!(lines, vec!["a", "", "", "b"]);
    }

    #[test]
    fn test_trailing_delimiter_emits_nothing_at_end() {
        let mut s = splitter();
        let lines = feed(&mut s, &["one\ntwo\n"]);
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let mut with_empty = splitter();
        let mut without = splitter();

        let a = feed(&mut with_empty, &["x\ny", "", "z\n"]);
        let b = feed(&mut without, &["x\ny", "z\n"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_multibyte_delimiter_split_across_chunks() {
        let mut s = LineSplitter::with_delimiter("\r\n").unwrap();

        assert!(s.process(Chunk::from("one\r")).unwrap().is_empty());
        assert_eq!(s.pending(), b"one\r");
        assert_eq!(
            s.process(Chunk::from("\ntwo")).unwrap(),
            vec![Chunk::from("one")]
        );
        assert_eq!(s.finish().unwrap(), vec![Chunk::from("two")]);
    }

    #[test]
    fn test_partial_delimiter_does_not_split() {
        let mut s = LineSplitter::with_delimiter("\r\n").unwrap();
        let lines = feed(&mut s, &["a\rb", "\r", "c"]);
        assert_eq!(lines, vec!["a\rb\rc"]);
    }

    #[test]
    fn test_split_emoji_reassembled() {
        let mut s = splitter();
        let smile = "😀".as_bytes();

        let mut first = b"hi ".to_vec();
        first.extend_from_slice(&smile[..2]);
        let mut second = smile[2..].to_vec();
        second.extend_from_slice(b"\n");

        assert!(s.process(Chunk::from(first)).unwrap().is_empty());
        assert_eq!(
            s.process(Chunk::from(second)).unwrap(),
            vec![Chunk::from("hi 😀")]
        );
    }

    #[test]
    fn test_invalid_utf8_line_is_binary() {
        let mut s = splitter();
        let out = s.process(Chunk::from(vec![0xFFu8, b'\n'])).unwrap();
        assert_eq!(out, vec![Chunk::Binary(vec![0xFF])]);
    }

    #[test]
    fn test_flush_is_idempotent() {
        let mut s = splitter();

        s.process(Chunk::from("tail")).unwrap();
        assert_eq!(s.finish().unwrap(), vec![Chunk::from("tail")]);
        assert!(s.finish().unwrap().is_empty());
        assert_eq!(s.lines_emitted(), 1);
        assert_eq!(s.process(Chunk::from("more")).unwrap_err(), StreamError::Closed);
    }

    #[test]
    fn test_empty_input_emits_nothing() {
        let mut s = splitter();
        assert!(s.finish().unwrap().is_empty());
    }

    #[test]
    fn test_overlapping_delimiter_matches_str_split() {
        let mut s = LineSplitter::with_delimiter("aa").unwrap();
        let lines = feed(&mut s, &["a", "aa", "b"]);
        let expected: Vec<&str> = "aaab".split("aa").collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        assert!(matches!(
            LineSplitter::with_delimiter(""),
            Err(ConfigError::EmptyDelimiter)
        ));
    }

    #[test]
    fn test_default_uses_platform_line_ending() {
        assert_eq!(LineSplitter::default().delimiter(), LINE_ENDING.as_bytes());
    }
}
