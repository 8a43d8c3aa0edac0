//! Shared test utilities for pdfdeck integration tests.
//!
//! This module provides:
//! - `TestHarness` for running a service against temp directories
//! - Fake conversion engines with scripted behaviour

pub mod engines;
pub mod harness;

pub use engines::*;
pub use harness::TestHarness;
