//! LLM provider integrations for toolpilot
//!
//! This crate provides the chat message model, the provider trait with its
//! streaming event type, and an OpenAI-compatible HTTP client.

pub mod base;
pub mod openai_compat;

pub use base::{
    LLMProvider, LLMResponse, LLMStreamEvent, Message, ProviderError, ProviderEventStream,
    ProviderResult, Role, ToolCallRequest,
};
pub use openai_compat::OpenAICompatClient;
