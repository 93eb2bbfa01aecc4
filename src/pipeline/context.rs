// src/pipeline/context.rs

//! Deterministic context extraction: named parties, monetary amounts, topic
//! tags, and agenda segmentation. Best-effort enrichment, never a gate — any
//! input (including empty) yields a well-formed context.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;

const MAX_COMPANIES: usize = 20;
const MAX_AMOUNTS: usize = 10;
const MAX_TOPICS: usize = 10;

/// Closed topic vocabulary; hits preserve this order.
const TOPIC_KEYWORDS: &[&str] = &[
    "бюджет",
    "крупная сделка",
    "приобретение",
    "назначение",
    "дивиденды",
    "займ",
    "кредит",
    "облигации",
    "капзатраты",
    "закуп",
    "реорганизация",
    "аудит",
    "стратегия",
];

static QUOTED_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[«"]([^"»]{3,})[»"]"#).unwrap());

static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d{1,3}(?:[\s,]\d{3})*(?:[.,]\d+)?\s*(?:млрд|млн|тыс)?\s*тенге").unwrap()
});

static ITEM_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.\s*(.*)$").unwrap());

/// Global agenda context derived from normalized text. Immutable once built.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GlobalContext {
    pub companies: Vec<String>,
    pub amounts: Vec<String>,
    pub topics: Vec<String>,
    pub total_items: usize,
}

/// One segmented agenda item.
#[derive(Debug, Clone, Serialize)]
pub struct AgendaItem {
    pub number: String,
    pub title: String,
    pub full_text: String,
}

/// Split agenda text into numbered items; fall back to blank-line-delimited
/// paragraphs when no numbered items are present.
pub fn parse_agenda(text: &str) -> Vec<AgendaItem> {
    let mut items: Vec<AgendaItem> = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in text.lines() {
        if let Some(caps) = ITEM_MARKER.captures(line.trim_start()) {
            if let Some((number, lines)) = current.take() {
                items.push(item_from_lines(number, lines));
            }
            current = Some((caps[1].to_string(), vec![caps[2].to_string()]));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line.to_string());
        }
    }
    if let Some((number, lines)) = current.take() {
        items.push(item_from_lines(number, lines));
    }

    if !items.is_empty() {
        return items;
    }

    // No numbered items: one item per non-empty paragraph.
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(idx, paragraph)| AgendaItem {
            number: (idx + 1).to_string(),
            title: truncate_title(paragraph),
            full_text: paragraph.to_string(),
        })
        .collect()
}

fn item_from_lines(number: String, lines: Vec<String>) -> AgendaItem {
    let full_text = lines.join("\n").trim().to_string();
    let title = full_text.lines().next().unwrap_or("").to_string();
    AgendaItem {
        number,
        title,
        full_text,
    }
}

fn truncate_title(paragraph: &str) -> String {
    let chars: Vec<char> = paragraph.chars().collect();
    if chars.len() > 100 {
        format!("{}...", chars[..100].iter().collect::<String>())
    } else {
        paragraph.to_string()
    }
}

/// Extract the global context from agenda text.
pub fn extract(text: &str) -> GlobalContext {
    let companies: Vec<String> = QUOTED_SPAN
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| {
            let words = name.split_whitespace().count();
            (2..=6).contains(&words)
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(MAX_COMPANIES)
        .collect();

    let amounts: Vec<String> = AMOUNT
        .find_iter(text)
        .take(MAX_AMOUNTS)
        .map(|m| m.as_str().to_string())
        .collect();

    let lower_text = text.to_lowercase();
    let topics: Vec<String> = TOPIC_KEYWORDS
        .iter()
        .filter(|keyword| lower_text.contains(*keyword))
        .take(MAX_TOPICS)
        .map(|keyword| keyword.to_string())
        .collect();

    GlobalContext {
        companies,
        amounts,
        topics,
        total_items: parse_agenda(text).len(),
    }
}
