// src/pipeline/decision.rs

//! Decision fusion: one model call over the item text and all agent outputs,
//! then marker-based section extraction with explicit per-field defaults.
//! This stage never fails — a broken call or unparseable response degrades
//! to an abstain verdict with diagnostic reasoning.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::agents::{format_analysis_block, AgendaAnalyses};
use crate::backend::CompletionBackend;
use crate::pipeline::context::AgendaItem;

const DEFAULT_RISKS: &str = "Не выявлены";
const DEFAULT_RECOMMENDATIONS: &str = "Нет дополнительных рекомендаций";

const DECISION_INSTRUCTIONS: &str = "Вы — виртуальный директор, член Совета директоров. Ваша задача — принять \
взвешенное решение по пункту повестки дня на основе предоставленных анализов.\n\n\
ПРИНЦИПЫ ПРИНЯТИЯ РЕШЕНИЙ:\n\
1. Соблюдение законодательства — приоритет №1\n\
2. Соответствие внутренним политикам компании\n\
3. Минимизация репутационных рисков\n\
4. Экономическая целесообразность\n\
5. Прозрачность и подотчетность\n\n\
ФОРМАТ ОТВЕТА:\n\
Решение: ЗА/ПРОТИВ\n\
Обоснование: [детальное обоснование со ссылками на источники]\n\
Риски: [выявленные риски]\n\
Рекомендации: [рекомендации по реализации или доработке]\n\n\
Будьте объективны, консервативны в оценке рисков, и всегда ссылайтесь на конкретные источники.";

static DECISION_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Решение:\s*(ЗА|ПРОТИВ)").unwrap());

/// The verdict on an agenda item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    For,
    Against,
    Abstain,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::For => "ЗА",
            Decision::Against => "ПРОТИВ",
            Decision::Abstain => "ВОЗДЕРЖАЛСЯ",
        }
    }
}

/// Structured verdict with the raw model response retained for audit.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionResult {
    pub decision: Decision,
    pub reasoning: String,
    pub risks: String,
    pub recommendations: String,
    pub full_response: String,
}

pub async fn synthesize_decision(
    llm: &dyn CompletionBackend,
    item: &AgendaItem,
    analyses: &AgendaAnalyses,
) -> DecisionResult {
    let context = format!(
        "ПУНКТ ПОВЕСТКИ ДНЯ:\n{}\n\n\
         АНАЛИЗ ВНУТРЕННИХ ДОКУМЕНТОВ:\n{}\n\n\
         ПРАВОВОЙ АНАЛИЗ:\n{}\n\n\
         ВЕБ-ПОИСК И РЕПУТАЦИОННЫЙ АНАЛИЗ:\n{}",
        item.full_text,
        format_analysis_block(&analyses.internal),
        format_analysis_block(&analyses.legal),
        format_analysis_block(&analyses.web),
    );

    let user_prompt = format!(
        "Проанализируйте следующую информацию и примите решение:\n\n{}\n\n\
         Примите решение ЗА или ПРОТИВ данного пункта повестки и дайте подробное обоснование.",
        context
    );

    match llm.complete(Some(DECISION_INSTRUCTIONS), &user_prompt).await {
        Ok(response) => parse_decision_response(&response),
        Err(e) => DecisionResult {
            decision: Decision::Abstain,
            reasoning: format!("Не удалось принять решение из-за технической ошибки: {e}"),
            risks: "Технические риски при анализе".to_string(),
            recommendations: "Требуется повторный анализ".to_string(),
            full_response: String::new(),
        },
    }
}

/// Extract the four ordered sections from the model's free-form response.
/// Each section runs from its marker to the next known marker or end of
/// text; a missing marker falls back to that field's default.
pub fn parse_decision_response(response: &str) -> DecisionResult {
    let decision = match DECISION_VALUE
        .captures(response)
        .map(|caps| caps[1].to_uppercase())
        .as_deref()
    {
        Some("ЗА") => Decision::For,
        Some("ПРОТИВ") => Decision::Against,
        _ => Decision::Abstain,
    };

    let reasoning = extract_section(response, "Обоснование:", &["Риски:", "Рекомендации:"])
        .unwrap_or_else(|| response.trim().to_string());
    let risks = extract_section(response, "Риски:", &["Рекомендации:"])
        .unwrap_or_else(|| DEFAULT_RISKS.to_string());
    let recommendations = extract_section(response, "Рекомендации:", &[])
        .unwrap_or_else(|| DEFAULT_RECOMMENDATIONS.to_string());

    DecisionResult {
        decision,
        reasoning,
        risks,
        recommendations,
        full_response: response.to_string(),
    }
}

/// Case-insensitive "marker up to next marker or end of text" scan.
fn extract_section(text: &str, marker: &str, next_markers: &[&str]) -> Option<String> {
    let (_, marker_end) = find_marker(text, marker)?;
    let body = &text[marker_end..];

    let end = next_markers
        .iter()
        .filter_map(|m| find_marker(body, m).map(|(start, _)| start))
        .min()
        .unwrap_or(body.len());

    Some(body[..end].trim().to_string())
}

/// Byte range of a marker's first occurrence, matched case-insensitively.
fn find_marker(text: &str, marker: &str) -> Option<(usize, usize)> {
    let pattern = Regex::new(&format!("(?i){}", regex::escape(marker))).ok()?;
    pattern.find(text).map(|m| (m.start(), m.end()))
}
