// src/pipeline/mod.rs

//! Staged analysis orchestrator.
//!
//! Sequences: agenda collection → normalization → context extraction →
//! query synthesis → three knowledge-source agents → decision synthesis →
//! report rendering. Progress events and the final artifact travel the same
//! channel, in emission order; any error escaping a stage is caught once
//! here and converted into an error artifact, and the terminal status event
//! is the last value of every run.

pub mod context;
pub mod decision;
pub mod events;
pub mod normalizer;
pub mod queries;

use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::agents::{AgendaAnalyses, InternalPolicyAgent, LegalComplianceAgent, PublicReactionAgent};
use crate::backend::{CompletionBackend, RetrievalBackend, WebSearchBackend};
use crate::config::SovetConfig;
use crate::report::{render, AnalysisReport, ItemAnalysis};

pub use context::{AgendaItem, GlobalContext};
pub use events::{PipelineOutput, StatusEvent};

const CONTEXT_OPEN: &str = "<context>";
const CONTEXT_CLOSE: &str = "</context>";

/// A turn of the inbound conversation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// The agenda analysis pipeline. Holds the immutable configuration and the
/// backend handles; all per-run state lives on the stack of `run`.
pub struct Pipeline {
    config: SovetConfig,
    llm: Arc<dyn CompletionBackend>,
    internal_agent: InternalPolicyAgent,
    legal_agent: LegalComplianceAgent,
    web_agent: PublicReactionAgent,
}

impl Pipeline {
    pub fn new(
        config: SovetConfig,
        llm: Arc<dyn CompletionBackend>,
        retrieval: Arc<dyn RetrievalBackend>,
        web_primary: Arc<dyn WebSearchBackend>,
        web_fallback: Arc<dyn WebSearchBackend>,
    ) -> Self {
        let internal_agent = InternalPolicyAgent::new(
            retrieval.clone(),
            config.vnd_collection_id.clone(),
            config.retrieval_top_k,
        );
        let legal_agent = LegalComplianceAgent::new(
            retrieval,
            config.legal_collection_id.clone(),
            config.retrieval_top_k,
        );
        let web_agent = PublicReactionAgent::new(web_primary, web_fallback, config.kz_sites.clone());

        Self {
            config,
            llm,
            internal_agent,
            legal_agent,
            web_agent,
        }
    }

    /// Run the full pipeline over a conversation payload, streaming status
    /// events and exactly one artifact into `tx`. Never returns an error:
    /// fatal stage failures become an error artifact, and the terminal
    /// status event is emitted on every path.
    pub async fn run(&self, messages: &[ChatMessage], tx: &mpsc::Sender<PipelineOutput>) {
        let agenda_text = collect_agenda(messages, tx).await;

        if let Err(e) = self.run_stages(&agenda_text, tx).await {
            warn!("pipeline run failed: {e}");
            let message = format!("Ошибка анализа повестки: {e}");
            emit_status(tx, &message).await;
            let _ = tx.send(PipelineOutput::Artifact(message)).await;
        }

        let _ = tx.send(PipelineOutput::Status(StatusEvent::terminal())).await;
    }

    async fn run_stages(
        &self,
        agenda_text: &str,
        tx: &mpsc::Sender<PipelineOutput>,
    ) -> anyhow::Result<()> {
        emit_status(tx, "Инициализация аналитического пайплайна...").await;

        emit_status(tx, "Препроцессинг повестки дня...").await;
        let summary_text =
            normalizer::normalize(self.llm.as_ref(), agenda_text, self.config.max_attempts)
                .await?;

        emit_status(tx, "Извлекаем глобальный контекст...").await;
        let global_context = context::extract(&summary_text);
        info!(
            "global context: {} companies, {} amounts, {} topics, {} items",
            global_context.companies.len(),
            global_context.amounts.len(),
            global_context.topics.len(),
            global_context.total_items
        );

        emit_status(tx, "Формируем запросы для агентов...").await;
        let queries = queries::synthesize_queries(
            self.llm.as_ref(),
            &summary_text,
            &global_context,
            self.config.max_attempts,
        )
        .await?;

        emit_status(tx, "Анализ внутренних документов (ВНД)...").await;
        let vnd_payload = format!("{}\n\nКонтекст:\n{}", queries.vnd_query, summary_text);
        let internal = self.internal_agent.analyze(&vnd_payload).await;

        emit_status(tx, "Правовой анализ (законодательство РК)...").await;
        let legal_payload = format!("{}\n\nКонтекст:\n{}", queries.legal_query, summary_text);
        let legal = self.legal_agent.analyze(&legal_payload).await;

        emit_status(tx, "Веб-поиск и репутационный анализ...").await;
        let web_payload = format!("{} {}", queries.web_query, truncate_chars(&summary_text, 500));
        let web = self.web_agent.analyze(&web_payload).await;

        let analyses = AgendaAnalyses {
            internal,
            legal,
            web,
        };

        emit_status(tx, "Синтезируем решение виртуального директора...").await;
        // The whole agenda is synthesized as a single item per run; the
        // per-item segmentation stays available through context::parse_agenda.
        let overall_item = AgendaItem {
            number: "1".to_string(),
            title: "Итоговый анализ повестки".to_string(),
            full_text: summary_text.clone(),
        };
        let decision_result =
            decision::synthesize_decision(self.llm.as_ref(), &overall_item, &analyses).await;

        emit_status(tx, "Анализ завершен. Формируем отчет...").await;
        let report = AnalysisReport::new(vec![ItemAnalysis {
            item: overall_item,
            analyses,
            decision: decision_result,
        }]);
        let rendered = render(&report);

        emit_status(tx, "Отчет сформирован успешно.").await;
        let _ = tx.send(PipelineOutput::Artifact(rendered)).await;

        Ok(())
    }
}

/// Accumulate agenda text from the conversation payload. Text between
/// `<context>` delimiters is extracted (one status event per extraction);
/// text outside any delimiter pair is taken verbatim.
async fn collect_agenda(messages: &[ChatMessage], tx: &mpsc::Sender<PipelineOutput>) -> String {
    let mut agenda_text = String::new();
    for message in messages {
        if let Some(delimited) = between_delimiters(&message.content) {
            agenda_text.push_str(delimited);
            agenda_text.push('\n');
            emit_status(tx, "Context received").await;
        } else {
            agenda_text.push_str(&message.content);
        }
    }
    agenda_text
}

fn between_delimiters(content: &str) -> Option<&str> {
    let start = content.find(CONTEXT_OPEN)? + CONTEXT_OPEN.len();
    let end = content[start..].find(CONTEXT_CLOSE)? + start;
    Some(&content[start..end])
}

async fn emit_status(tx: &mpsc::Sender<PipelineOutput>, description: &str) {
    // A dropped receiver must not abort the run.
    let _ = tx
        .send(PipelineOutput::Status(StatusEvent::status(description)))
        .await;
}

/// Truncate to a character count, respecting UTF-8 boundaries.
fn truncate_chars(s: &str, chars: usize) -> String {
    s.chars().take(chars).collect()
}
