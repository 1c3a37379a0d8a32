//! Streaming stages for chunked bodies
//!
//! This module provides single-pass transforms that:
//! - Enforce a cumulative byte limit (encoding aware)
//! - Reassemble lines split across chunk boundaries
//! - Compose into pipelines driven with backpressure

pub mod chunk;
pub mod driver;
pub mod error;
pub mod line_splitter;
pub mod pipe;
pub mod size_limiter;

pub use chunk::{Chunk, TextEncoding};
pub use driver::{collect, Collected, Flow, StreamDriver, StreamOutcome};
pub use error::StreamError;
pub use line_splitter::LineSplitter;
pub use pipe::Pipe;
pub use size_limiter::SizeLimiter;

/// Lifecycle of a single-use stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Accepting input
    Open,
    /// End of input processed, flushed
    Finished,
    /// Failed, no further input or output
    Failed,
}

impl StageState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StageState::Open)
    }
}

/// A one-directional pipeline stage.
///
/// `process_into` is called once per incoming chunk, `finish_into` once at
/// end of input. Both append the records produced by that step to `out`,
/// in order. Records appended before a failure are valid output and stay
/// in `out`; the error marks where the stream was cut.
pub trait Transform {
    /// Consume one chunk
    fn process_into(&mut self, chunk: Chunk, out: &mut Vec<Chunk>) -> Result<(), StreamError>;

    /// Signal end of input and flush
    fn finish_into(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError>;

    /// End of input carrying an optional final chunk.
    ///
    /// The final chunk goes through `process_into` like any other.
    fn end_into(&mut self, last: Option<Chunk>, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        if let Some(chunk) = last {
            self.process_into(chunk, out)?;
        }
        self.finish_into(out)
    }

    /// Consume one chunk, returning its records.
    ///
    /// On failure, records produced before the error are only reachable
    /// through `process_into` or a [`StreamDriver`].
    fn process(&mut self, chunk: Chunk) -> Result<Vec<Chunk>, StreamError> {
        let mut out = Vec::new();
        self.process_into(chunk, &mut out)?;
        Ok(out)
    }

    /// Signal end of input, returning the flushed records
    fn finish(&mut self) -> Result<Vec<Chunk>, StreamError> {
        let mut out = Vec::new();
        self.finish_into(&mut out)?;
        Ok(out)
    }

    fn end(&mut self, last: Option<Chunk>) -> Result<Vec<Chunk>, StreamError> {
        let mut out = Vec::new();
        self.end_into(last, &mut out)?;
        Ok(out)
    }

    /// Feed this stage's output into `next`
    fn pipe<B: Transform>(self, next: B) -> Pipe<Self, B>
    where
        Self: Sized,
    {
        Pipe::new(self, next)
    }
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn process_into(&mut self, chunk: Chunk, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        (**self).process_into(chunk, out)
    }

    fn finish_into(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        (**self).finish_into(out)
    }
}
