//! Common test utilities for the integration tests.
//!
//! This module provides:
//! - A SuperClaude-shaped repository fixture
//! - Assertions over detection results and generation summaries

pub mod assertions;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
pub use fixtures::*;
