// src/report/mod.rs

//! Report model, run-wide summary computation, and the deterministic text
//! renderer. The renderer is a pure function of the report value: the
//! timestamp is captured once when the report is built, so rendering the
//! same report twice yields byte-identical output.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::agents::AgendaAnalyses;
use crate::pipeline::context::AgendaItem;
use crate::pipeline::decision::{Decision, DecisionResult};

/// Phrases that mark an item's risks text as high risk.
const HIGH_RISK_PHRASES: &[&str] = &["высокий риск", "критический"];

/// One analyzed agenda item with its agent outputs and verdict.
#[derive(Debug, Clone, Serialize)]
pub struct ItemAnalysis {
    pub item: AgendaItem,
    pub analyses: AgendaAnalyses,
    pub decision: DecisionResult,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DecisionCounts {
    pub r#for: usize,
    pub against: usize,
    pub abstain: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub decisions: DecisionCounts,
    /// Share of FOR verdicts, in [0, 1].
    pub approval_rate: f64,
    pub high_risk_items: Vec<String>,
}

/// The complete run artifact. Built once at the end of a run; immutable.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub timestamp: DateTime<Utc>,
    pub item_count: usize,
    pub results: Vec<ItemAnalysis>,
    pub summary: ReportSummary,
}

impl AnalysisReport {
    pub fn new(results: Vec<ItemAnalysis>) -> Self {
        let summary = build_summary(&results);
        Self {
            timestamp: Utc::now(),
            item_count: results.len(),
            results,
            summary,
        }
    }
}

pub fn build_summary(results: &[ItemAnalysis]) -> ReportSummary {
    let mut counts = DecisionCounts::default();
    for result in results {
        match result.decision.decision {
            Decision::For => counts.r#for += 1,
            Decision::Against => counts.against += 1,
            Decision::Abstain => counts.abstain += 1,
        }
    }

    let approval_rate = if results.is_empty() {
        0.0
    } else {
        counts.r#for as f64 / results.len() as f64
    };

    let high_risk_items = results
        .iter()
        .filter(|result| {
            let risks = result.decision.risks.to_lowercase();
            HIGH_RISK_PHRASES.iter().any(|phrase| risks.contains(phrase))
        })
        .map(|result| result.item.number.clone())
        .collect();

    ReportSummary {
        decisions: counts,
        approval_rate,
        high_risk_items,
    }
}

/// Render the final human-readable artifact. Pure and deterministic.
pub fn render(report: &AnalysisReport) -> String {
    let rule = "=".repeat(80);
    let mut lines = vec![
        rule.clone(),
        "Виртуальный директор — независимый (цифровой) член Совета директоров".to_string(),
        "Анализ повестки дня Совета директоров".to_string(),
        rule.clone(),
        format!("Дата анализа: {}", report.timestamp.to_rfc3339()),
        format!("Количество пунктов: {}", report.item_count),
        String::new(),
        "СВОДКА РЕШЕНИЙ:".to_string(),
        format!("• ЗА: {}", report.summary.decisions.r#for),
        format!("• ПРОТИВ: {}", report.summary.decisions.against),
        format!("• ВОЗДЕРЖАЛСЯ: {}", report.summary.decisions.abstain),
        format!(
            "• Процент одобрения: {:.1}%",
            report.summary.approval_rate * 100.0
        ),
        String::new(),
        rule.clone(),
        "ДЕТАЛЬНЫЙ АНАЛИЗ ПО ПУНКТАМ".to_string(),
        rule.clone(),
        String::new(),
    ];

    for result in &report.results {
        let item = &result.item;
        let decision = &result.decision;
        lines.extend([
            format!("ПУНКТ {}: {}", item.number, item.title),
            "-".repeat(60),
            format!("РЕШЕНИЕ: {}", decision.decision.as_str()),
            String::new(),
            format!(
                "ОБОСНОВАНИЕ (по вопросу №{} повестки — {}):",
                item.number, item.title
            ),
            decision.reasoning.clone(),
            String::new(),
            "ВЫЯВЛЕННЫЕ РИСКИ:".to_string(),
            decision.risks.clone(),
            String::new(),
            "РЕКОМЕНДАЦИИ:".to_string(),
            decision.recommendations.clone(),
            String::new(),
            rule.clone(),
            String::new(),
        ]);
    }

    lines.join("\n")
}
