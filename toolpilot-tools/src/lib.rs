//! Tools for toolpilot
//!
//! This crate provides the `Tool` trait, the tool registry and the
//! connector tools (Gmail, Calendar, Sheets, Docs, knowledge base, browser
//! and shell).

pub mod base;
pub mod browser;
pub mod catalog;
pub mod google;
pub mod http;
pub mod notion;
pub mod registry;
pub mod shell;

pub use base::{StaticToken, TokenSource, Tool, ToolError, ToolResult};
pub use browser::{BrowserAction, BrowserDriver, BrowserSession, HttpBrowserDriver, PageState};
pub use catalog::build_registry;
pub use http::ApiClient;
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use shell::ExecTool;
