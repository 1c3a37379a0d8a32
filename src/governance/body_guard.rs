//! Request Body Guard
//!
//! Runs each request body chunk through a size limiter and, for
//! line-delimited content, a line splitter. Chunks are inspected as they
//! arrive; only the unterminated line fragment is retained between them.

use log::debug;

use crate::config::{ConfigError, GuardConfig};
use crate::streaming::{
    Chunk, Flow, LineSplitter, Pipe, SizeLimiter, StreamDriver, StreamError, StreamOutcome,
    Transform,
};

/// Stages applied to one body
enum GuardStages {
    Limit(SizeLimiter),
    LimitAndSplit(Pipe<SizeLimiter, LineSplitter>),
}

impl GuardStages {
    fn limiter(&self) -> &SizeLimiter {
        match self {
            GuardStages::Limit(limiter) => limiter,
            GuardStages::LimitAndSplit(pipe) => pipe.first(),
        }
    }

    fn splitter(&self) -> Option<&LineSplitter> {
        match self {
            GuardStages::Limit(_) => None,
            GuardStages::LimitAndSplit(pipe) => Some(pipe.second()),
        }
    }
}

impl Transform for GuardStages {
    fn process_into(&mut self, chunk: Chunk, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        match self {
            GuardStages::Limit(limiter) => limiter.process_into(chunk, out),
            GuardStages::LimitAndSplit(pipe) => pipe.process_into(chunk, out),
        }
    }

    fn finish_into(&mut self, out: &mut Vec<Chunk>) -> Result<(), StreamError> {
        match self {
            GuardStages::Limit(limiter) => limiter.finish_into(out),
            GuardStages::LimitAndSplit(pipe) => pipe.finish_into(out),
        }
    }
}

/// Per-request body guard
pub struct BodyGuard {
    driver: StreamDriver<GuardStages>,
    /// Records (chunks or lines) handed to the consumer
    records_seen: usize,
    log_lines: bool,
}

impl BodyGuard {
    /// Guard that only enforces the size limit
    pub fn new(config: &GuardConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_stages(config, GuardStages::Limit(config.limiter()?)))
    }

    /// Guard that also splits the body into lines
    pub fn with_lines(config: &GuardConfig) -> Result<Self, ConfigError> {
        let pipe = config.limiter()?.pipe(config.splitter()?);
        Ok(Self::with_stages(config, GuardStages::LimitAndSplit(pipe)))
    }

    /// Pick stages from the request content type
    pub fn for_content_type(
        config: &GuardConfig,
        content_type: Option<&str>,
    ) -> Result<Self, ConfigError> {
        match content_type {
            Some(ct) if config.splits_content_type(ct) => Self::with_lines(config),
            _ => Self::new(config),
        }
    }

    fn with_stages(config: &GuardConfig, stages: GuardStages) -> Self {
        Self {
            driver: StreamDriver::with_high_water_mark(stages, config.high_water_mark),
            records_seen: 0,
            log_lines: config.log_lines,
        }
    }

    /// Process a body chunk.
    ///
    /// Call this for each chunk received; the final call carries
    /// `end_of_stream = true`.
    pub fn on_body_chunk(&mut self, chunk: &[u8], end_of_stream: bool) -> GuardDecision {
        if let Some(outcome) = self.driver.outcome() {
            return match outcome {
                StreamOutcome::Completed => GuardDecision::Allow,
                StreamOutcome::Truncated(e) => GuardDecision::Reject(e.clone()),
            };
        }

        // Wire bytes: counted by raw length, never re-encoded
        let chunk = Chunk::Binary(chunk.to_vec());
        let written = if end_of_stream {
            self.driver.end(Some(chunk))
        } else {
            self.driver.write(chunk)
        };
        // Nothing downstream of the guard needs the records themselves
        self.consume();

        match written {
            Err(e) => GuardDecision::Reject(e),
            Ok(_) if end_of_stream => GuardDecision::Allow,
            Ok(Flow::Ready) | Ok(Flow::Pause) => GuardDecision::Continue,
        }
    }

    fn consume(&mut self) {
        while let Some(record) = self.driver.read() {
            self.records_seen += 1;
            if self.log_lines && self.driver.stage().splitter().is_some() {
                match record.as_str() {
                    Some(line) => debug!("Line {}: {}", self.records_seen, line),
                    None => debug!("Line {}: {} binary byte(s)", self.records_seen, record.len()),
                }
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.driver.outcome().is_some()
    }

    pub fn outcome(&self) -> Option<&StreamOutcome> {
        self.driver.outcome()
    }

    /// Bytes counted against the limit
    pub fn total_bytes(&self) -> usize {
        self.driver.stage().limiter().bytes_seen()
    }

    pub fn limit(&self) -> usize {
        self.driver.stage().limiter().limit()
    }

    /// Lines emitted, if the body is being split
    pub fn lines(&self) -> Option<usize> {
        self.driver.stage().splitter().map(LineSplitter::lines_emitted)
    }

    /// Records handed out so far
    pub fn records_seen(&self) -> usize {
        self.records_seen
    }
}

/// Decision from guarding a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Keep streaming - more chunks expected
    Continue,
    /// Body completed within the limit
    Allow,
    /// Body went over the limit - reject the request
    Reject(StreamError),
}

impl GuardDecision {
    /// Check if this is a rejecting decision
    pub fn is_reject(&self) -> bool {
        matches!(self, GuardDecision::Reject(_))
    }

    /// Check if streaming should continue
    pub fn should_continue(&self) -> bool {
        matches!(self, GuardDecision::Continue)
    }

    /// Get the failure if rejected
    pub fn error(&self) -> Option<&StreamError> {
        match self {
            GuardDecision::Reject(e) => Some(e),
            _ => None,
        }
    }
}
