//! Backpressure-aware stage driver
//!
//! Wraps a stage with an output queue. Producers `write` chunks and get a
//! [`Flow`] back: once the queued output reaches the high-water mark the
//! driver answers `Flow::Pause` and the producer should hold further input
//! until the consumer has `read` enough to bring it back under the mark.
//! Records already produced stay queued and are never dropped, even after
//! the stage fails.
//!
//! The driver does not enforce `Flow::Pause`: writes are still accepted
//! while paused, so callers must honor the returned `Flow` themselves.
//!
//! How the stream ended is reported as a single [`StreamOutcome`]:
//! `Completed` only after a clean end of input, `Truncated` on failure.

use std::collections::VecDeque;

use log::debug;

use super::{Chunk, StreamError, Transform};

/// Producer guidance returned by every write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Consumer can take more
    Ready,
    /// Output queue is full, hold input
    Pause,
}

/// How a stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// End of input reached cleanly
    Completed,
    /// Stream aborted; output seen so far is incomplete
    Truncated(StreamError),
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamOutcome::Completed)
    }

    /// Failure that truncated the stream
    pub fn error(&self) -> Option<&StreamError> {
        match self {
            StreamOutcome::Truncated(e) => Some(e),
            StreamOutcome::Completed => None,
        }
    }
}

/// Drives a stage and buffers its output for a consumer
pub struct StreamDriver<T> {
    stage: T,
    /// Produced records not yet read
    queue: VecDeque<Chunk>,
    /// In-memory bytes held by `queue`
    queued_bytes: usize,
    high_water_mark: usize,
    /// End of input has been signaled
    ended: bool,
    outcome: Option<StreamOutcome>,
}

impl<T: Transform> StreamDriver<T> {
    /// Default output buffer, in bytes
    pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

    pub fn new(stage: T) -> Self {
        Self::with_high_water_mark(stage, Self::DEFAULT_HIGH_WATER_MARK)
    }

    /// A mark of zero pauses after any queued output
    pub fn with_high_water_mark(stage: T, high_water_mark: usize) -> Self {
        Self {
            stage,
            queue: VecDeque::new(),
            queued_bytes: 0,
            high_water_mark,
            ended: false,
            outcome: None,
        }
    }

    /// Push one chunk through the stage.
    ///
    /// The stage's failure is returned here once; the driver is then
    /// closed and later writes get `StreamError::Closed`.
    pub fn write(&mut self, chunk: Chunk) -> Result<Flow, StreamError> {
        if self.ended {
            return Err(StreamError::Closed);
        }

        let mut records = Vec::new();
        let result = self.stage.process_into(chunk, &mut records);
        // Records produced before a failure are still valid output
        self.enqueue(records);

        match result {
            Ok(()) => Ok(self.flow()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Signal end of input, with an optional final chunk.
    ///
    /// Repeating `end` after a clean completion is a no-op.
    pub fn end(&mut self, last: Option<Chunk>) -> Result<Flow, StreamError> {
        if self.ended {
            return match self.outcome {
                Some(StreamOutcome::Completed) => Ok(self.flow()),
                _ => Err(StreamError::Closed),
            };
        }
        self.ended = true;

        let mut records = Vec::new();
        let result = self.stage.end_into(last, &mut records);
        self.enqueue(records);

        match result {
            Ok(()) => {
                self.outcome = Some(StreamOutcome::Completed);
                debug!("Stream completed, {} record(s) queued", self.queue.len());
                Ok(self.flow())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Take the next output record
    pub fn read(&mut self) -> Option<Chunk> {
        let record = self.queue.pop_front()?;
        self.queued_bytes -= record.len();
        Some(record)
    }

    /// Take every queued record
    pub fn drain(&mut self) -> Vec<Chunk> {
        self.queued_bytes = 0;
        self.queue.drain(..).collect()
    }

    /// Current producer guidance
    pub fn flow(&self) -> Flow {
        if self.is_paused() {
            Flow::Pause
        } else {
            Flow::Ready
        }
    }

    pub fn is_paused(&self) -> bool {
        !self.queue.is_empty() && self.queued_bytes >= self.high_water_mark
    }

    /// Number of records waiting to be read
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn outcome(&self) -> Option<&StreamOutcome> {
        self.outcome.as_ref()
    }

    /// Completed cleanly and every record has been read
    pub fn is_finished(&self) -> bool {
        matches!(self.outcome, Some(StreamOutcome::Completed)) && self.queue.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.outcome, Some(StreamOutcome::Truncated(_)))
    }

    pub fn stage(&self) -> &T {
        &self.stage
    }

    fn enqueue(&mut self, records: Vec<Chunk>) {
        for record in records {
            self.queued_bytes += record.len();
            self.queue.push_back(record);
        }
    }

    fn fail(&mut self, error: StreamError) -> StreamError {
        self.ended = true;
        if self.outcome.is_none() {
            self.outcome = Some(StreamOutcome::Truncated(error.clone()));
        }
        error
    }
}

/// Records and outcome of a fully driven stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    pub records: Vec<Chunk>,
    pub outcome: StreamOutcome,
}

/// Run `stage` over `chunks`, then end input with `last`.
///
/// Feeding stops at the first failure.
pub fn collect<T, I>(stage: T, chunks: I, last: Option<Chunk>) -> Collected
where
    T: Transform,
    I: IntoIterator<Item = Chunk>,
{
    let mut driver = StreamDriver::new(stage);
    let mut records = Vec::new();

    for chunk in chunks {
        let written = driver.write(chunk);
        records.extend(driver.drain());
        if written.is_err() {
            break;
        }
    }
    if !driver.ended {
        if let Err(e) = driver.end(last) {
            debug!("Stream truncated at end of input: {}", e);
        }
        records.extend(driver.drain());
    }

    let outcome = driver
        .outcome
        .take()
        .unwrap_or(StreamOutcome::Completed);
    Collected { records, outcome }
}
