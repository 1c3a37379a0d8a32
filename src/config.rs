//! Configuration module for the payload guard filter
//!
//! CRITICAL: Configuration is loaded from Envoy plugin configuration,
//! NOT from external files. This avoids file I/O in the Wasm sandbox.

use serde::Deserialize;

use crate::streaming::line_splitter::LINE_ENDING;
use crate::streaming::{LineSplitter, SizeLimiter, StreamDriver, TextEncoding};

/// Filter configuration loaded from Envoy plugin configuration
#[derive(Clone, Debug, Deserialize)]
pub struct GuardConfig {
    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Encoding used to count text bytes
    #[serde(default = "default_text_encoding")]
    pub text_encoding: String,

    /// Line terminator for line-delimited bodies
    #[serde(default = "default_line_delimiter")]
    pub line_delimiter: String,

    /// Content types whose bodies are split into lines
    #[serde(default = "default_split_content_types")]
    pub split_content_types: Vec<String>,

    /// Queued output, in bytes, before the producer is paused
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark: usize,

    /// Whether to log every split line (for debugging)
    #[serde(default = "default_log_lines")]
    pub log_lines: bool,
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_text_encoding() -> String {
    "utf-8".to_string()
}

fn default_line_delimiter() -> String {
    LINE_ENDING.to_string()
}

fn default_split_content_types() -> Vec<String> {
    vec![
        "application/x-ndjson".to_string(),
        "application/jsonl".to_string(),
        "text/plain".to_string(),
    ]
}

fn default_high_water_mark() -> usize {
    StreamDriver::<SizeLimiter>::DEFAULT_HIGH_WATER_MARK
}

fn default_log_lines() -> bool {
    false
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_body_size: default_max_body_size(),
            text_encoding: default_text_encoding(),
            line_delimiter: default_line_delimiter(),
            split_content_types: default_split_content_types(),
            high_water_mark: default_high_water_mark(),
            log_lines: default_log_lines(),
        }
    }
}

impl GuardConfig {
    /// Parse and validate configuration from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config_str = std::str::from_utf8(bytes)
            .map_err(|e| ConfigError::InvalidUtf8(e.to_string()))?;

        let config: Self = serde_json::from_str(config_str)
            .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field a stage would reject
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_size == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        if self.line_delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        self.encoding().map(|_| ())
    }

    pub fn encoding(&self) -> Result<TextEncoding, ConfigError> {
        self.text_encoding.parse()
    }

    /// Size limiter for one body
    pub fn limiter(&self) -> Result<SizeLimiter, ConfigError> {
        SizeLimiter::new(self.max_body_size, self.encoding()?)
    }

    /// Line splitter for one body
    pub fn splitter(&self) -> Result<LineSplitter, ConfigError> {
        LineSplitter::with_delimiter(&self.line_delimiter)
    }

    /// Check if a content type carries line-delimited records
    pub fn splits_content_type(&self, content_type: &str) -> bool {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        self.split_content_types
            .iter()
            .any(|ct| ct.eq_ignore_ascii_case(&media_type))
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidUtf8(String),
    InvalidJson(String),
    /// Size limit must be positive
    ZeroLimit,
    UnknownEncoding(String),
    /// Line delimiter must not be empty
    EmptyDelimiter,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidUtf8(e) => write!(f, "Invalid UTF-8: {}", e),
            ConfigError::InvalidJson(e) => write!(f, "Invalid JSON: {}", e),
            ConfigError::ZeroLimit => write!(f, "Size limit must be greater than zero"),
            ConfigError::UnknownEncoding(e) => write!(f, "Unknown text encoding: {}", e),
            ConfigError::EmptyDelimiter => write!(f, "Line delimiter must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}
