//! LLM integration: HTTP client, prompt context and response parsing

pub mod client;
pub mod context;
pub mod parser;

pub use client::LlmClient;
pub use context::CivContext;
