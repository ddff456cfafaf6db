//! AI assistant module
//!
//! Natural-language query assistance for dashboards. A user prompt is
//! answered by the configured LLM provider with the dashboard's schema and
//! RLS constraints as context; generated SQL is executed against the
//! dashboard's warehouse and every interaction is written to the audit log.
//!
//! # Architecture
//! ```text
//! handlers ──► AssistantService (orchestration)
//!                 ├── AssistantRepository (provider config + chat log, SQLite)
//!                 ├── LlmClient ──► CompletionBackend {OpenAI, Gemini}
//!                 ├── context / parser (prompt rendering, SQL extraction)
//!                 └── SqlExecutor (warehouse execution seam)
//! ```

mod client;
mod context;
mod models;
mod parser;
mod repository;
mod service;

pub use client::{CompletionBackend, GeminiBackend, LlmClient, OpenAiBackend};
pub use models::*;
pub use service::AssistantService;

#[allow(unused_imports)]
pub(crate) use repository::AssistantRepository;

#[cfg(test)]
mod tests;
