//! Governance module for the payload guard
//!
//! This module provides:
//! - Per-request body guard (size limit, line framing)

pub mod body_guard;

pub use body_guard::{BodyGuard, GuardDecision};
