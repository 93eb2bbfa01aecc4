// src/config/mod.rs

use serde::Deserialize;
use std::str::FromStr;

/// Immutable pipeline configuration, loaded once at startup and passed into
/// the pipeline by value. Backend identifiers and the domain allow-list live
/// here rather than in module-level state.
#[derive(Debug, Clone, Deserialize)]
pub struct SovetConfig {
    // ── OpenAI Configuration
    pub openai_base_url: String,
    pub completion_model: String,

    // ── Document collections (pre-indexed vector stores)
    pub vnd_collection_id: String,
    pub legal_collection_id: String,
    pub retrieval_top_k: usize,

    // ── Web search (primary tier)
    pub perplexity_url: String,
    pub web_search_model: String,
    pub web_search_timeout: u64,

    // ── Regional domain allow-list for the web agent
    pub kz_sites: Vec<String>,

    // ── Retry bounds for validated model calls
    pub max_attempts: usize,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            clean_val.parse::<T>().unwrap_or(default)
        }
        Err(_) => default,
    }
}

const DEFAULT_KZ_SITES: &[&str] = &[
    "online.zakon.kz",
    "adilet.zan.kz",
    "stat.gov.kz",
    "kase.kz",
    "nationalbank.kz",
    "afm.gov.kz",
    "afsa.kz",
    "forbes.kz",
    "kursiv.media",
    "inbusiness.kz",
    "tengrinews.kz",
    "informburo.kz",
    "kapital.kz",
];

impl SovetConfig {
    pub fn from_env() -> Self {
        let kz_sites = match std::env::var("SOVET_KZ_SITES") {
            Ok(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => DEFAULT_KZ_SITES.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            openai_base_url: env_var_or(
                "OPENAI_BASE_URL",
                "https://api.openai.com/v1".to_string(),
            ),
            completion_model: env_var_or("SOVET_COMPLETION_MODEL", "gpt-4o".to_string()),
            vnd_collection_id: env_var_or("SOVET_VND_COLLECTION", String::new()),
            legal_collection_id: env_var_or("SOVET_LEGAL_COLLECTION", String::new()),
            retrieval_top_k: env_var_or("SOVET_RETRIEVAL_TOP_K", 8),
            perplexity_url: env_var_or(
                "SOVET_PERPLEXITY_URL",
                "https://api.perplexity.ai/chat/completions".to_string(),
            ),
            web_search_model: env_var_or("SOVET_WEB_SEARCH_MODEL", "sonar-pro".to_string()),
            web_search_timeout: env_var_or("SOVET_WEB_SEARCH_TIMEOUT", 30),
            kz_sites,
            max_attempts: env_var_or("SOVET_MAX_ATTEMPTS", 3),
        }
    }
}
