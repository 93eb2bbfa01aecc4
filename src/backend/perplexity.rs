// src/backend/perplexity.rs

//! Primary web-search tier: Perplexity chat completions with a hard
//! `search_domain_filter`. Any failure here (network, non-2xx, timeout,
//! malformed payload) is an `Err` the web agent turns into a tier fallback.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use super::WebSearchBackend;

#[derive(Clone)]
pub struct PerplexityClient {
    client: Client,
    api_key: String,
    url: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct PerplexityRequest {
    model: String,
    messages: Vec<PerplexityMessage>,
    search_domain_filter: Vec<String>,
}

#[derive(Serialize)]
struct PerplexityMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct PerplexityResponse {
    choices: Option<Vec<PerplexityChoice>>,
}

#[derive(Deserialize)]
struct PerplexityChoice {
    message: PerplexityMessageResponse,
}

#[derive(Deserialize)]
struct PerplexityMessageResponse {
    content: Option<String>,
}

impl PerplexityClient {
    pub fn new(url: String, model: String, timeout_secs: u64) -> Result<Self> {
        let api_key = env::var("PERPLEXITY_API_KEY").context("PERPLEXITY_API_KEY not set")?;
        Ok(Self {
            client: Client::new(),
            api_key,
            url,
            model,
            timeout_secs,
        })
    }
}

#[async_trait]
impl WebSearchBackend for PerplexityClient {
    async fn search(&self, query: &str, domains: &[String]) -> Result<String> {
        let content = format!(
            "Найдите актуальную информацию по запросу: {}\n\n\
             Сосредоточьтесь на новостях и событиях в Казахстане, официальных заявлениях, \
             экономических данных, репутационных аспектах и мнениях экспертов. \
             Предоставьте структурированный ответ с указанием источников.",
            query
        );

        let api_request = PerplexityRequest {
            model: self.model.clone(),
            messages: vec![PerplexityMessage {
                role: "user".to_string(),
                content,
            }],
            search_domain_filter: domains.to_vec(),
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&api_request)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .context("Failed to send Perplexity request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Perplexity API error: {} - {}", status, body);
        }

        let api_response: PerplexityResponse = response
            .json()
            .await
            .context("Failed to parse Perplexity response")?;

        api_response
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No content in Perplexity response"))
    }
}
