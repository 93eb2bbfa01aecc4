// src/backend/mod.rs

//! Narrow contracts over the external reasoning/retrieval services.
//!
//! The pipeline stages only ever see these three traits; the reqwest
//! implementations live in the submodules and tests substitute mocks.

pub mod openai;
pub mod perplexity;

pub use openai::OpenAiClient;
pub use perplexity::PerplexityClient;

use anyhow::Result;
use async_trait::async_trait;

/// Plain model completion: optional system instruction plus a user prompt,
/// returns the model's text output.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String>;
}

/// Retrieval-augmented answer over a pre-indexed document collection.
/// Returns the backend's synthesized answer text, not raw passages.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    async fn search(&self, query: &str, collection_id: &str, max_results: usize)
        -> Result<String>;
}

/// Web-aware search restricted to a domain allow-list.
#[async_trait]
pub trait WebSearchBackend: Send + Sync {
    async fn search(&self, query: &str, domains: &[String]) -> Result<String>;
}
