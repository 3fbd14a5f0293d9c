//! # Raid Test Utilities
//!
//! Shared testing utilities for the workspace:
//! - Determinism test harness
//! - Session fixtures
//! - Property-based testing strategies
//! - Tracing setup for test output

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod logging;

/// Re-export proptest for convenience.
pub use proptest;
