//! Telemetry Module for the payload guard
//!
//! In Wasm, we emit structured logs that can be collected by
//! Envoy's access logging or external collectors.

use log::{info, warn};
use serde::Serialize;

use crate::streaming::StreamError;

/// Audit event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Body passed through within the limit
    BodyCompleted,
    /// Body rejected part way through
    BodyTruncated,
    /// Line-delimited body split into records
    LinesSplit,
}

/// Audit event for logging
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event type
    pub event_type: AuditEventType,
    /// Request ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Request content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Bytes counted against the limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_seen: Option<usize>,
    /// Configured limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Lines emitted by the splitter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
    /// Reason for action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            request_id: None,
            content_type: None,
            bytes_seen: None,
            limit: None,
            lines: None,
            reason: None,
        }
    }

    pub fn with_request_id(mut self, id: &str) -> Self {
        self.request_id = Some(id.to_string());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn with_bytes(mut self, bytes_seen: usize, limit: usize) -> Self {
        self.bytes_seen = Some(bytes_seen);
        self.limit = Some(limit);
        self
    }

    pub fn with_lines(mut self, lines: usize) -> Self {
        self.lines = Some(lines);
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    /// Log the event
    pub fn emit(&self) {
        // Serialize to JSON for structured logging
        match serde_json::to_string(self) {
            Ok(json) => match self.event_type {
                AuditEventType::BodyTruncated => {
                    warn!("[PAYLOAD-GUARD-AUDIT] {}", json);
                }
                _ => {
                    info!("[PAYLOAD-GUARD-AUDIT] {}", json);
                }
            },
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
            }
        }
    }
}

/// Create a truncated body audit event
pub fn audit_truncated(error: &StreamError) -> AuditEvent {
    let event = AuditEvent::new(AuditEventType::BodyTruncated).with_reason(&error.to_string());

    match error {
        StreamError::LimitExceeded { limit, seen } => event.with_bytes(*seen, *limit),
        StreamError::Closed => event,
    }
}

/// Create a completed body audit event
pub fn audit_completed(bytes_seen: usize, limit: usize) -> AuditEvent {
    AuditEvent::new(AuditEventType::BodyCompleted).with_bytes(bytes_seen, limit)
}

/// Create a lines split audit event
pub fn audit_lines(lines: usize) -> AuditEvent {
    AuditEvent::new(AuditEventType::LinesSplit).with_lines(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::new(AuditEventType::BodyTruncated)
            .with_request_id("req-123")
            .with_bytes(12, 9);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("body_truncated"));
        assert!(json.contains("\"limit\":9"));
        assert!(!json.contains("lines"));
    }

    #[test]
    fn test_audit_truncated() {
        let event = audit_truncated(&StreamError::LimitExceeded { limit: 2, seen: 3 });
        assert_eq!(event.bytes_seen, Some(3));
        assert_eq!(event.limit, Some(2));
        assert!(event.reason.as_ref().unwrap().contains("Limit exceeded"));
    }

    #[test]
    fn test_audit_lines() {
        let event = audit_lines(4);
        assert_eq!(event.event_type, AuditEventType::LinesSplit);
        assert_eq!(event.lines, Some(4));
    }
}
