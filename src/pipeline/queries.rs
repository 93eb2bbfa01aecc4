// src/pipeline/queries.rs

//! Validated, retried synthesis of the three agent-specific queries from the
//! normalized agenda plus extracted context.

use serde_json::Value;
use tracing::warn;

use crate::backend::CompletionBackend;
use crate::error::PipelineError;
use crate::pipeline::context::GlobalContext;

const SYSTEM_PROMPT: &str = "Вы — помощник виртуального директора. На основе ПОЛНОГО текста повестки дня \
сформируйте три самодостаточных запроса для подагентов: vnd_query (внутренние документы), \
legal_query (законодательство РК), web_query (веб-поиск). Ответ СТРОГО JSON с этими тремя ключами.";

/// One query per knowledge-source agent. All three fields are mandatory;
/// a set with any empty field is never returned.
#[derive(Debug, Clone)]
pub struct AgentQuerySet {
    pub vnd_query: String,
    pub legal_query: String,
    pub web_query: String,
}

pub async fn synthesize_queries(
    llm: &dyn CompletionBackend,
    agenda_text: &str,
    context: &GlobalContext,
    max_attempts: usize,
) -> Result<AgentQuerySet, PipelineError> {
    let user_prompt = format!(
        "Глобальный контекст — Компании: {}; Темы: {}; Всего пунктов: {}.\n\n\
         Полный текст повестки ниже. Используйте его целиком для формирования ТРЁХ запросов:\n\n{}",
        join_or_dash(&context.companies),
        join_or_dash(&context.topics),
        context.total_items,
        agenda_text
    );

    let mut last_cause = String::from("no attempts made");
    for attempt in 1..=max_attempts {
        match llm.complete(Some(SYSTEM_PROMPT), &user_prompt).await {
            Ok(raw) => match parse_query_set(&raw) {
                Ok(queries) => return Ok(queries),
                Err(cause) => {
                    warn!("query synthesis attempt {attempt} rejected: {cause}");
                    last_cause = cause;
                }
            },
            Err(e) => {
                warn!("query synthesis attempt {attempt} errored: {e}");
                last_cause = e.to_string();
            }
        }
    }

    Err(PipelineError::QuerySynthesisFailed {
        attempts: max_attempts,
        cause: last_cause,
    })
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

/// Parse the model output as JSON, or as the first brace-delimited span when
/// the model wrapped the JSON in prose or fences.
fn parse_query_set(raw: &str) -> Result<AgentQuerySet, String> {
    let parsed: Value = match serde_json::from_str(raw.trim()) {
        Ok(value) => value,
        Err(_) => {
            let span = brace_span(raw).ok_or_else(|| "response is not JSON".to_string())?;
            serde_json::from_str(span).map_err(|e| format!("embedded JSON invalid: {e}"))?
        }
    };

    let field = |key: &str| -> Result<String, String> {
        let value = parsed
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        if value.is_empty() {
            Err(format!("missing or empty required key {key}"))
        } else {
            Ok(value)
        }
    };

    Ok(AgentQuerySet {
        vnd_query: field("vnd_query")?,
        legal_query: field("legal_query")?,
        web_query: field("web_query")?,
    })
}

/// First `{` through last `}` of the text, if both exist in order.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
