//! Core types and utilities for toolpilot
//!
//! This crate provides the error type, configuration schema and loader,
//! logging setup and the agent event wire type shared by every other
//! toolpilot crate.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod utils;

pub use error::{Error, Result};
pub use events::AgentEvent;
