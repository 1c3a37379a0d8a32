//! Stream failure conditions

use std::fmt;

/// Failure raised by a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Cumulative bytes went past the configured limit
    LimitExceeded {
        /// Configured limit in bytes
        limit: usize,
        /// Total bytes counted, including the rejected chunk
        seen: usize,
    },
    /// Input arrived after the stage reached a terminal state
    Closed,
}

impl StreamError {
    /// Bytes over the limit, for `LimitExceeded`
    pub fn overage(&self) -> Option<usize> {
        match self {
            StreamError::LimitExceeded { limit, seen } => Some(seen.saturating_sub(*limit)),
            StreamError::Closed => None,
        }
    }

    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, StreamError::LimitExceeded { .. })
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::LimitExceeded { limit, seen } => write!(
                f,
                "Limit exceeded: {} bytes seen, limit is {} bytes",
                seen, limit
            ),
            StreamError::Closed => write!(f, "Stream is closed"),
        }
    }
}

impl std::error::Error for StreamError {}
