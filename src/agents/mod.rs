// src/agents/mod.rs

//! Knowledge-source agents. Each wraps one external backend and normalizes
//! its result into `AnalysisResult`; agents never return `Err` — backend
//! failures are captured as the `Error` variant and flow downstream as
//! visible context.

use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::backend::{CompletionBackend, RetrievalBackend, WebSearchBackend};

/// Normalized agent output. Downstream stages treat both variants as opaque
/// text; errors are rendered inline, not filtered out.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResult {
    Success {
        query: String,
        response: String,
        source: String,
        agent: String,
    },
    Error {
        query: String,
        error: String,
        source: String,
        agent: String,
    },
}

/// The fixed-order collection of all three agent results for one run.
#[derive(Debug, Clone, Serialize)]
pub struct AgendaAnalyses {
    pub internal: AnalysisResult,
    pub legal: AnalysisResult,
    pub web: AnalysisResult,
}

/// Render an agent result for inclusion in the decision prompt. Errors stay
/// visible so the fusing model sees the failure context.
pub fn format_analysis_block(result: &AnalysisResult) -> String {
    match result {
        AnalysisResult::Success { response, .. } => response.clone(),
        AnalysisResult::Error { error, .. } => format!("ОШИБКА: {error}"),
    }
}

// ============================================================================
// Internal-Policy Agent
// ============================================================================

/// Checks an agenda item against the company's internal policy documents.
pub struct InternalPolicyAgent {
    retrieval: Arc<dyn RetrievalBackend>,
    collection_id: String,
    top_k: usize,
}

impl InternalPolicyAgent {
    pub fn new(retrieval: Arc<dyn RetrievalBackend>, collection_id: String, top_k: usize) -> Self {
        Self {
            retrieval,
            collection_id,
            top_k,
        }
    }

    pub async fn analyze(&self, agenda_item: &str) -> AnalysisResult {
        let query = format!(
            "Проанализируйте следующий пункт повестки дня на соответствие внутренним документам компании:\n\n{}\n\n\
             Необходимо проверить: соответствие внутренним политикам и процедурам, требования к процессу \
             принятия решений, полномочия органов управления, возможные ограничения или требования.",
            agenda_item
        );

        match self
            .retrieval
            .search(&query, &self.collection_id, self.top_k)
            .await
        {
            Ok(response) => AnalysisResult::Success {
                query,
                response,
                source: "internal_documents".to_string(),
                agent: "VND".to_string(),
            },
            Err(e) => AnalysisResult::Error {
                query,
                error: e.to_string(),
                source: "internal_documents".to_string(),
                agent: "VND".to_string(),
            },
        }
    }
}

// ============================================================================
// Legal-Compliance Agent
// ============================================================================

/// Checks an agenda item against the indexed legislation collection.
pub struct LegalComplianceAgent {
    retrieval: Arc<dyn RetrievalBackend>,
    collection_id: String,
    top_k: usize,
}

impl LegalComplianceAgent {
    pub fn new(retrieval: Arc<dyn RetrievalBackend>, collection_id: String, top_k: usize) -> Self {
        Self {
            retrieval,
            collection_id,
            top_k,
        }
    }

    pub async fn analyze(&self, agenda_item: &str) -> AnalysisResult {
        let query = format!(
            "Проведите правовой анализ следующего пункта повестки дня:\n\n{}\n\n\
             Необходимо проверить: соответствие действующему законодательству РК, требования к процедуре \
             принятия решения, необходимые согласования и разрешения, правовые риски и ограничения, \
             ответственность за нарушения.",
            agenda_item
        );

        match self
            .retrieval
            .search(&query, &self.collection_id, self.top_k)
            .await
        {
            Ok(response) => AnalysisResult::Success {
                query,
                response,
                source: "legal_documents".to_string(),
                agent: "Legal".to_string(),
            },
            Err(e) => AnalysisResult::Error {
                query,
                error: e.to_string(),
                source: "legal_documents".to_string(),
                agent: "Legal".to_string(),
            },
        }
    }
}

// ============================================================================
// Public-Reaction Agent
// ============================================================================

/// Gauges likely public/media reaction. Two-tier: a web-search backend with a
/// hard domain filter first, then an unconditional fallback to a web-aware
/// model call with the allow-list as a prompt instruction.
pub struct PublicReactionAgent {
    primary: Arc<dyn WebSearchBackend>,
    fallback: Arc<dyn WebSearchBackend>,
    domains: Vec<String>,
}

impl PublicReactionAgent {
    pub fn new(
        primary: Arc<dyn WebSearchBackend>,
        fallback: Arc<dyn WebSearchBackend>,
        domains: Vec<String>,
    ) -> Self {
        Self {
            primary,
            fallback,
            domains,
        }
    }

    pub async fn analyze(&self, agenda_item: &str) -> AnalysisResult {
        let query = format!(
            "Проанализируйте возможную общественную и медийную реакцию на следующее решение:\n\n{}\n\n\
             Найдите: похожие случаи и реакцию на них, мнения экспертов, потенциальные репутационные риски, \
             общественное мнение по теме, рекомендации по коммуникации.",
            agenda_item
        );

        match self.primary.search(&query, &self.domains).await {
            Ok(response) => AnalysisResult::Success {
                query,
                response,
                source: "web_search_perplexity".to_string(),
                agent: "WebSearch".to_string(),
            },
            Err(e) => {
                warn!("primary web search failed, using fallback tier: {e}");
                self.fallback_search(query).await
            }
        }
    }

    async fn fallback_search(&self, query: String) -> AnalysisResult {
        match self.fallback.search(&query, &self.domains).await {
            Ok(response) => AnalysisResult::Success {
                query,
                response,
                source: "web_search_fallback".to_string(),
                agent: "WebSearch".to_string(),
            },
            Err(e) => AnalysisResult::Error {
                query,
                error: e.to_string(),
                source: "web_search_fallback".to_string(),
                agent: "WebSearch".to_string(),
            },
        }
    }
}
