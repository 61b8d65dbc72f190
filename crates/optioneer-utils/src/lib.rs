//! Shared utilities for optioneer
//!
//! This crate provides common functionality used across the optioneer workspace:
//! tracing setup for binaries and helpers for reading credentials from the
//! environment.

pub mod env;
pub mod logging;

pub use env::env_var;
pub use logging::{LogFormat, init_tracing, init_tracing_with, init_tracing_with_default};
