//! Payload Guard Wasm Filter for Envoy Proxy
//!
//! This filter streams HTTP request bodies through a byte-limiting stage
//! and, for line-delimited content types, a line splitter. Bodies that go
//! over the configured byte limit are rejected with 413 Payload Too Large
//! as soon as the offending chunk arrives.
//!
//! The stages in [`streaming`] have no proxy dependency and can be driven
//! directly.
//!
//! Targets: wasm32-wasi (Envoy proxy-wasm ABI)

pub mod config;
pub mod governance;
pub mod streaming;
pub mod telemetry;

use log::{debug, info, warn};
use proxy_wasm::traits::{Context, HttpContext, RootContext};
use proxy_wasm::types::{Action, ContextType};
use std::cell::RefCell;

use crate::config::GuardConfig;
use crate::governance::{BodyGuard, GuardDecision};
use crate::streaming::StreamError;

// Thread-local storage for filter configuration
thread_local! {
    static CONFIG: RefCell<GuardConfig> = RefCell::new(GuardConfig::default());
}

/// Root context for filter lifecycle management
struct GuardRootContext {
    config: GuardConfig,
}

impl GuardRootContext {
    fn new() -> Self {
        Self {
            config: GuardConfig::default(),
        }
    }
}

impl Context for GuardRootContext {}

impl RootContext for GuardRootContext {
    fn on_configure(&mut self, _plugin_configuration_size: usize) -> bool {
        if let Some(config_bytes) = self.get_plugin_configuration() {
            match GuardConfig::from_bytes(&config_bytes) {
                Ok(config) => self.config = config,
                Err(e) => {
                    warn!("Rejecting payload guard configuration: {}", e);
                    return false;
                }
            }
        }

        // Store config in thread-local for HTTP contexts to access
        CONFIG.with(|c| {
            *c.borrow_mut() = self.config.clone();
        });

        info!(
            "Payload guard initialized: limit {} bytes ({}), {} line-delimited content type(s)",
            self.config.max_body_size,
            self.config.text_encoding,
            self.config.split_content_types.len()
        );

        true
    }

    fn create_http_context(&self, context_id: u32) -> Option<Box<dyn HttpContext>> {
        Some(Box::new(GuardHttpContext::new(context_id)))
    }

    fn get_type(&self) -> Option<ContextType> {
        Some(ContextType::HttpContext)
    }
}

/// HTTP context for per-request processing
struct GuardHttpContext {
    context_id: u32,
    /// Body guard, created once request headers are seen
    guard: Option<BodyGuard>,
    content_type: Option<String>,
    /// Track if we've already sent a reject response
    request_rejected: bool,
    /// Configuration snapshot for this request
    config: GuardConfig,
}

impl GuardHttpContext {
    fn new(context_id: u32) -> Self {
        let config = CONFIG.with(|c| c.borrow().clone());

        Self {
            context_id,
            guard: None,
            content_type: None,
            request_rejected: false,
            config,
        }
    }

    fn request_id(&self) -> String {
        self.context_id.to_string()
    }

    /// Send a 413 response with JSON error body
    fn send_reject_response(&mut self, error: &StreamError) {
        if self.request_rejected {
            return; // Already rejected, don't send duplicate response
        }

        self.request_rejected = true;

        let error_body = serde_json::json!({
            "error": "Payload Too Large",
            "reason": error.to_string(),
            "limit": self.config.max_body_size,
            "status": 413
        });

        let body_bytes = error_body.to_string();
        let limit = self.config.max_body_size.to_string();

        telemetry::audit_truncated(error)
            .with_request_id(&self.request_id())
            .emit();

        self.send_http_response(
            413,
            vec![
                ("content-type", "application/json"),
                ("x-payload-guard-rejected", "true"),
                ("x-payload-guard-limit", limit.as_str()),
            ],
            Some(body_bytes.as_bytes()),
        );
    }

    fn emit_completed(&self, guard: &BodyGuard) {
        let mut event = telemetry::audit_completed(guard.total_bytes(), guard.limit())
            .with_request_id(&self.request_id());
        if let Some(ct) = &self.content_type {
            event = event.with_content_type(ct);
        }
        event.emit();

        if let Some(lines) = guard.lines() {
            telemetry::audit_lines(lines)
                .with_request_id(&self.request_id())
                .emit();
        }
    }
}

impl Context for GuardHttpContext {}

impl HttpContext for GuardHttpContext {
    fn on_http_request_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        debug!("[context_id={}] Processing request headers", self.context_id);

        self.content_type = self.get_http_request_header("content-type");

        match BodyGuard::for_content_type(&self.config, self.content_type.as_deref()) {
            Ok(guard) => self.guard = Some(guard),
            Err(e) => {
                // Config was validated in on_configure; fail open for availability
                warn!(
                    "[context_id={}] Body guard unavailable: {}",
                    self.context_id, e
                );
            }
        }

        Action::Continue
    }

    fn on_http_request_body(&mut self, body_size: usize, end_of_stream: bool) -> Action {
        // If already rejected, don't process further
        if self.request_rejected {
            return Action::Pause;
        }

        debug!(
            "[context_id={}] Received body chunk: {} bytes, end_of_stream: {}",
            self.context_id, body_size, end_of_stream
        );

        let chunk = self
            .get_http_request_body(0, body_size)
            .unwrap_or_default();

        let Some(mut guard) = self.guard.take() else {
            return Action::Continue;
        };
        let decision = guard.on_body_chunk(&chunk, end_of_stream);

        let action = match &decision {
            GuardDecision::Reject(e) => {
                self.send_reject_response(e);
                Action::Pause
            }
            GuardDecision::Allow => {
                self.emit_completed(&guard);
                Action::Continue
            }
            GuardDecision::Continue => Action::Continue,
        };

        self.guard = Some(guard);
        action
    }

    fn on_log(&mut self) {
        if self.request_rejected {
            info!(
                "[context_id={}] Request was REJECTED by payload guard",
                self.context_id
            );
        } else {
            debug!("[context_id={}] Request processing complete", self.context_id);
        }
    }
}

// Register the filter with proxy-wasm runtime; host builds only run the tests
#[cfg(target_arch = "wasm32")]
proxy_wasm::main! {{
    proxy_wasm::set_log_level(proxy_wasm::types::LogLevel::Debug);
    proxy_wasm::set_root_context(|_| -> Box<dyn RootContext> {
        Box::new(GuardRootContext::new())
    });
}}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::{collect, Chunk, LineSplitter, SizeLimiter, StreamOutcome, Transform};

    #[test]
    fn test_default_context_config() {
        let context = GuardHttpContext::new(7);
        assert_eq!(context.config.max_body_size, GuardConfig::default().max_body_size);
        assert!(context.guard.is_none());
        assert!(!context.request_rejected);
    }

    #[test]
    fn test_root_context_creates_http_contexts() {
        let root = GuardRootContext::new();
        assert!(matches!(root.get_type(), Some(ContextType::HttpContext)));
        assert!(root.create_http_context(1).is_some());
    }

    #[test]
    fn test_stages_compose_either_way() {
        let chunks = || vec![Chunk::from("ab"), Chunk::from("c\nde"), Chunk::from("f")];

        let limit_first = SizeLimiter::utf8(7)
            .unwrap()
            .pipe(LineSplitter::with_delimiter("\n").unwrap());
        let split_first = LineSplitter::with_delimiter("\n")
            .unwrap()
            .pipe(SizeLimiter::utf8(6).unwrap());

        let a = collect(limit_first, chunks(), None);
        let b = collect(split_first, chunks(), None);

        assert_eq!(a.records, vec![Chunk::from("abc"), Chunk::from("def")]);
        assert_eq!(a, b);
        assert_eq!(a.outcome, StreamOutcome::Completed);
    }
}
