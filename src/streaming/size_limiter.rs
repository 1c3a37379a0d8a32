//! Size Limiter
//!
//! Pass-through stage that counts encoded bytes and fails once the running
//! total goes past the limit. The offending chunk is never forwarded.

use log::{debug, warn};

use super::{Chunk, StageState, StreamError, TextEncoding, Transform};
use crate::config::ConfigError;

/// Byte-limited pass-through stage
#[derive(Debug)]
pub struct SizeLimiter {
    /// Maximum cumulative bytes (inclusive)
    limit: usize,
    /// Encoding used to size text chunks
    encoding: TextEncoding,
    /// Bytes counted so far, including a rejected chunk
    bytes_seen: usize,
    state: StageState,
}

impl SizeLimiter {
    /// Create a limiter; `limit` must be positive
    pub fn new(limit: usize, encoding: TextEncoding) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }

        Ok(Self {
            limit,
            encoding,
            bytes_seen: 0,
            state: StageState::Open,
        })
    }

    /// UTF-8 limiter
    pub fn utf8(limit: usize) -> Result<Self, ConfigError> {
        Self::new(limit, TextEncoding::Utf8)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn bytes_seen(&self) -> usize {
        self.bytes_seen
    }

    /// Bytes still accepted before the limit trips
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.bytes_seen)
    }

    pub fn state(&self) -> StageState {
        self.state
    }
}

impl Transform for SizeLimiter {
    fn process_into(&mut self, chunk: Chunk, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        if self.state.is_terminal() {
            return Err(StreamError::Closed);
        }

        self.bytes_seen = self
            .bytes_seen
            .saturating_add(chunk.encoded_len(self.encoding));

        if self.bytes_seen > self.limit {
            self.state = StageState::Failed;
            warn!(
                "Size limit exceeded: {} bytes seen, limit {} ({})",
                self.bytes_seen, self.limit, self.encoding
            );
            return Err(StreamError::LimitExceeded {
                limit: self.limit,
                seen: self.bytes_seen,
            });
        }

        // Empty chunks carry no data and produce no record
        if chunk.is_empty() {
            return Ok(());
        }

        debug!("Forwarding chunk, {}/{} bytes", self.bytes_seen, self.limit);
        out.push(chunk);
        Ok(())
    }

    fn finish_into(&mut self, _out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        match self.state {
            StageState::Failed => Err(StreamError::Closed),
            StageState::Open | StageState::Finished => {
                self.state = StageState::Finished;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Chunk {
        Chunk::from(s)
    }

    #[test]
    fn test_passthrough_under_limit() {
        let mut limiter = SizeLimiter::utf8(3).unwrap();

        assert_eq!(limiter.process(text("a")).unwrap(), vec![text("a")]);
        assert_eq!(limiter.process(text("b")).unwrap(), vec![text("b")]);
        assert!(limiter.finish().unwrap().is_empty());
        assert_eq!(limiter.state(), StageState::Finished);
        assert_eq!(limiter.bytes_seen(), 2);
    }

    #[test]
    fn test_exact_limit_is_allowed() {
        let mut limiter = SizeLimiter::utf8(2).unwrap();

        limiter.process(text("ab")).unwrap();
        assert_eq!(limiter.remaining(), 0);
        assert!(limiter.finish().is_ok());
    }

    #[test]
    fn test_final_chunk_with_end_is_checked() {
        let mut limiter = SizeLimiter::utf8(2).unwrap();

        limiter.process(text("a")).unwrap();
        limiter.process(text("b")).unwrap();
        let err = limiter.end(Some(text("c"))).unwrap_err();

        assert_eq!(err, StreamError::LimitExceeded { limit: 2, seen: 3 });
        assert_eq!(limiter.state(), StageState::Failed);
    }

    #[test]
    fn test_counts_bytes_not_chars() {
        let smile = "😀";
        let mut limiter = SizeLimiter::utf8(smile.len() * 2 + 1).unwrap();

        assert!(limiter.process(text(smile)).is_ok());
        assert!(limiter.process(text(smile)).is_ok());
        let err = limiter.process(text(smile)).unwrap_err();

        assert_eq!(err, StreamError::LimitExceeded { limit: 9, seen: 12 });
    }

    #[test]
    fn test_utf16_encoding_doubles_ascii() {
        let mut limiter = SizeLimiter::new(5, TextEncoding::Utf16Le).unwrap();

        assert!(limiter.process(text("ab")).is_ok());
        assert!(limiter.process(text("c")).unwrap_err().is_limit_exceeded());
    }

    #[test]
    fn test_binary_counts_raw_length() {
        let mut limiter = SizeLimiter::new(4, TextEncoding::Utf16Le).unwrap();

        assert!(limiter.process(Chunk::from(vec![1u8, 2, 3, 4])).is_ok());
        assert!(limiter.process(Chunk::from(vec![5u8])).is_err());
    }

    #[test]
    fn test_terminal_after_failure() {
        let mut limiter = SizeLimiter::utf8(1).unwrap();

        assert!(limiter.process(text("xx")).unwrap_err().is_limit_exceeded());
        // Raised once; later input is refused without a second overflow
        assert_eq!(limiter.process(text("")).unwrap_err(), StreamError::Closed);
        assert_eq!(limiter.finish().unwrap_err(), StreamError::Closed);
        assert_eq!(limiter.bytes_seen(), 2);
    }

    #[test]
    fn test_input_after_finish_is_refused() {
        let mut limiter = SizeLimiter::utf8(8).unwrap();

        limiter.finish().unwrap();
        assert_eq!(limiter.process(text("a")).unwrap_err(), StreamError::Closed);
        assert!(limiter.finish().unwrap().is_empty());
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(SizeLimiter::utf8(0), Err(ConfigError::ZeroLimit)));
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let mut limiter = SizeLimiter::utf8(1).unwrap();

        assert!(limiter.process(text("")).unwrap().is_empty());
        assert_eq!(limiter.bytes_seen(), 0);
    }
}
