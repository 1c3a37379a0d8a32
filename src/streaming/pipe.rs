//! Stage composition
//!
//! `Pipe<A, B>` feeds every record produced by `A` into `B`, in order.
//! A failure in either stage fails the whole pipe. Records the second
//! stage accepted before the failure are still handed out.

use super::{Chunk, StageState, StreamError, Transform};

/// Two stages run back to back
#[derive(Debug)]
pub struct Pipe<A, B> {
    first: A,
    second: B,
    state: StageState,
}

impl<A: Transform, B: Transform> Pipe<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            state: StageState::Open,
        }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }

    /// Run `records` through the second stage, stopping at its first
    /// failure. Records it accepted before failing are already in `out`.
    fn feed_second(
        &mut self,
        records: Vec<Chunk>,
        out: &mut Vec<Chunk>,
    ) -> Result<(), StreamError> {
        for record in records {
            self.second.process_into(record, out)?;
        }
        Ok(())
    }

    fn track(&mut self, result: Result<(), StreamError>) -> Result<(), StreamError> {
        if result.is_err() {
            self.state = StageState::Failed;
        }
        result
    }
}

impl<A: Transform, B: Transform> Transform for Pipe<A, B> {
    fn process_into(&mut self, chunk: Chunk, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        if self.state.is_terminal() {
            return Err(StreamError::Closed);
        }

        let mut mid = Vec::new();
        let first = self.first.process_into(chunk, &mut mid);
        // Whatever the first stage let through still reaches the second
        let result = self.feed_second(mid, out).and(first);
        self.track(result)
    }

    fn finish_into(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        match self.state {
            StageState::Failed => return Err(StreamError::Closed),
            StageState::Finished => return Ok(()),
            StageState::Open => {}
        }

        let mut mid = Vec::new();
        let first = self.first.finish_into(&mut mid);
        let result = self
            .feed_second(mid, out)
            .and(first)
            .and_then(|()| self.second.finish_into(out));
        self.track(result)?;
        self.state = StageState::Finished;
        Ok(())
    }
}
