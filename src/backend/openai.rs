// src/backend/openai.rs

//! OpenAI Responses API client. One reqwest client covers all three backend
//! roles: plain completion, file-search retrieval over a vector-store
//! collection, and the web-search fallback tier.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

use super::{CompletionBackend, RetrievalBackend, WebSearchBackend};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_base: String, model: String) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        Ok(Self {
            client: Client::new(),
            api_key,
            api_base,
            model,
        })
    }

    /// POST a Responses API payload and return the concatenated output text.
    async fn responses(&self, body: Value) -> Result<String> {
        let url = format!("{}/responses", self.api_base.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await
            .context("Failed to send Responses API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error: {} - {}", status, body);
        }

        let response_json: Value = response
            .json()
            .await
            .context("Failed to parse Responses API body")?;

        extract_output_text(&response_json)
            .ok_or_else(|| anyhow!("No output text in Responses API body"))
    }
}

/// Walk the Responses API output array and join all output_text parts.
/// Some gateways also surface a flat "output_text" convenience field.
fn extract_output_text(body: &Value) -> Option<String> {
    if let Some(text) = body["output_text"].as_str() {
        return Some(text.to_string());
    }

    let items = body["output"].as_array()?;
    let mut parts = Vec::new();
    for item in items {
        if item["type"].as_str() != Some("message") {
            continue;
        }
        if let Some(content) = item["content"].as_array() {
            for block in content {
                if block["type"].as_str() == Some("output_text") {
                    if let Some(text) = block["text"].as_str() {
                        parts.push(text.to_string());
                    }
                }
            }
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(""))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "input": user,
        });
        if let Some(instructions) = system {
            body["instructions"] = json!(instructions);
        }
        self.responses(body).await
    }
}

#[async_trait]
impl RetrievalBackend for OpenAiClient {
    async fn search(
        &self,
        query: &str,
        collection_id: &str,
        max_results: usize,
    ) -> Result<String> {
        let body = json!({
            "model": self.model,
            "input": query,
            "tools": [{
                "type": "file_search",
                "vector_store_ids": [collection_id],
                "max_num_results": max_results,
            }],
        });
        self.responses(body).await
    }
}

#[async_trait]
impl WebSearchBackend for OpenAiClient {
    /// Fallback web tier: the allow-list is a prompt instruction here, not a
    /// hard filter like the primary tier applies.
    async fn search(&self, query: &str, domains: &[String]) -> Result<String> {
        let prompt = format!(
            "Найдите актуальную информацию в интернете по запросу: {}\n\n\
             Особое внимание уделите казахстанским источникам, новостям за последние месяцы, \
             официальным заявлениям, репутационным рискам и экспертным оценкам.\n\
             Сосредоточьтесь на информации с сайтов: {}",
            query,
            domains.join(", ")
        );
        let body = json!({
            "model": self.model,
            "input": prompt,
            "tools": [{"type": "web_search_preview"}],
        });
        self.responses(body).await
    }
}
