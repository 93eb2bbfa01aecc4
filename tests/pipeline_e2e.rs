// tests/pipeline_e2e.rs

//! Full-pipeline tests against mock backends: no network, deterministic
//! model output, scripted failures.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use sovet::agents::{AnalysisResult, PublicReactionAgent};
use sovet::backend::{CompletionBackend, RetrievalBackend, WebSearchBackend};
use sovet::config::SovetConfig;
use sovet::pipeline::decision::{synthesize_decision, Decision};
use sovet::pipeline::{AgendaItem, ChatMessage, Pipeline, PipelineOutput};

// ============================================================================
// Mock backends
// ============================================================================

/// Completion backend that replays scripted responses in call order and
/// records every prompt it receives.
struct ScriptedCompletion {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<(Option<String>, String)>>,
}

impl ScriptedCompletion {
    fn new(responses: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn recorded_calls(&self) -> Vec<(Option<String>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedCompletion {
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.map(str::to_string), user.to_string()));
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response left")),
        }
    }
}

struct MockRetrieval {
    fail: bool,
}

#[async_trait]
impl RetrievalBackend for MockRetrieval {
    async fn search(&self, _query: &str, collection_id: &str, _max: usize) -> Result<String> {
        if self.fail {
            Err(anyhow!("retrieval backend unavailable"))
        } else {
            Ok(format!("выдержки из коллекции {collection_id}"))
        }
    }
}

struct MockWeb {
    fail: bool,
    label: &'static str,
}

#[async_trait]
impl WebSearchBackend for MockWeb {
    async fn search(&self, _query: &str, _domains: &[String]) -> Result<String> {
        if self.fail {
            Err(anyhow!("{} tier failed", self.label))
        } else {
            Ok(format!("результаты веб-поиска ({})", self.label))
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

const NORMALIZED: &str = "1. Увеличение бюджета на 5 000 000 тенге";
const QUERIES_JSON: &str =
    r#"{"vnd_query": "внутренние политики по бюджету", "legal_query": "законодательство о бюджете", "web_query": "реакция на увеличение бюджета"}"#;
const DECISION_TEXT: &str = "Решение: ЗА\nОбоснование: бюджет обоснован.\nРиски: высокий риск задержек.\nРекомендации: контролировать исполнение.";

fn test_config() -> SovetConfig {
    std::env::set_var("SOVET_VND_COLLECTION", "vs_vnd");
    std::env::set_var("SOVET_LEGAL_COLLECTION", "vs_legal");
    SovetConfig::from_env()
}

fn happy_pipeline(llm: Arc<ScriptedCompletion>) -> Pipeline {
    Pipeline::new(
        test_config(),
        llm,
        Arc::new(MockRetrieval { fail: false }),
        Arc::new(MockWeb {
            fail: false,
            label: "primary",
        }),
        Arc::new(MockWeb {
            fail: false,
            label: "fallback",
        }),
    )
}

async fn collect_outputs(pipeline: Pipeline, messages: Vec<ChatMessage>) -> Vec<PipelineOutput> {
    let (tx, mut rx) = mpsc::channel(64);
    pipeline.run(&messages, &tx).await;
    drop(tx);

    let mut outputs = Vec::new();
    while let Some(output) = rx.recv().await {
        outputs.push(output);
    }
    outputs
}

fn status_descriptions(outputs: &[PipelineOutput]) -> Vec<String> {
    outputs
        .iter()
        .filter_map(|output| match output {
            PipelineOutput::Status(event) => Some(event.description().to_string()),
            PipelineOutput::Artifact(_) => None,
        })
        .collect()
}

fn artifacts(outputs: &[PipelineOutput]) -> Vec<String> {
    outputs
        .iter()
        .filter_map(|output| match output {
            PipelineOutput::Artifact(text) => Some(text.clone()),
            PipelineOutput::Status(_) => None,
        })
        .collect()
}

fn user_message(content: &str) -> Vec<ChatMessage> {
    vec![ChatMessage {
        role: "user".to_string(),
        content: content.to_string(),
    }]
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn happy_path_produces_report_and_terminal_event() {
    let llm = ScriptedCompletion::new(vec![
        Ok(NORMALIZED.to_string()),
        Ok(QUERIES_JSON.to_string()),
        Ok(DECISION_TEXT.to_string()),
    ]);
    let pipeline = happy_pipeline(llm);

    let outputs = collect_outputs(
        pipeline,
        user_message("1. Approve budget increase of 5 000 000 тенге for Company X"),
    )
    .await;

    let reports = artifacts(&outputs);
    assert_eq!(reports.len(), 1, "exactly one artifact per run");
    let report = &reports[0];
    assert!(report.contains("ПУНКТ 1:"));
    assert!(report.contains("РЕШЕНИЕ: ЗА"));
    assert!(report.contains("бюджет обоснован."));
    assert!(report.contains("Процент одобрения: 100.0%"));

    // Terminal event with an empty description is the last value.
    match outputs.last().unwrap() {
        PipelineOutput::Status(event) => assert_eq!(event.description(), ""),
        other => panic!("run did not end with the terminal event: {other:?}"),
    }

    let statuses = status_descriptions(&outputs);
    let expected_stages = [
        "Инициализация аналитического пайплайна...",
        "Препроцессинг повестки дня...",
        "Извлекаем глобальный контекст...",
        "Формируем запросы для агентов...",
        "Анализ внутренних документов (ВНД)...",
        "Правовой анализ (законодательство РК)...",
        "Веб-поиск и репутационный анализ...",
        "Синтезируем решение виртуального директора...",
        "Анализ завершен. Формируем отчет...",
        "Отчет сформирован успешно.",
        "",
    ];
    assert_eq!(statuses, expected_stages);
}

#[tokio::test]
async fn context_delimiters_are_extracted_with_status() {
    let llm = ScriptedCompletion::new(vec![
        Ok(NORMALIZED.to_string()),
        Ok(QUERIES_JSON.to_string()),
        Ok(DECISION_TEXT.to_string()),
    ]);
    let pipeline = happy_pipeline(llm.clone());

    let outputs = collect_outputs(
        pipeline,
        user_message("<context>1. Пункт из контекста</context>"),
    )
    .await;

    let statuses = status_descriptions(&outputs);
    assert_eq!(statuses[0], "Context received");

    // The delimited text reached the normalizer prompt.
    let calls = llm.recorded_calls();
    assert!(calls[0].1.contains("1. Пункт из контекста"));
    assert!(!calls[0].1.contains("<context>"));
}

#[tokio::test]
async fn normalization_failure_yields_single_error_artifact() {
    // Three attempts, all structurally invalid.
    let llm = ScriptedCompletion::new(vec![
        Ok("без нумерации".to_string()),
        Ok("всё ещё без нумерации".to_string()),
        Ok("2. нумерация не с единицы".to_string()),
    ]);
    let pipeline = happy_pipeline(llm);

    let outputs = collect_outputs(pipeline, user_message("какая-то повестка")).await;

    let errors = artifacts(&outputs);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Ошибка анализа повестки:"));
    assert!(errors[0].contains("normalization failed"));

    match outputs.last().unwrap() {
        PipelineOutput::Status(event) => assert_eq!(event.description(), ""),
        other => panic!("run did not end with the terminal event: {other:?}"),
    }
}

#[tokio::test]
async fn query_synthesis_retries_then_fails() {
    let llm = ScriptedCompletion::new(vec![
        Ok(NORMALIZED.to_string()),
        // Three rejected attempts: not JSON, empty field, missing field.
        Ok("не json".to_string()),
        Ok(r#"{"vnd_query": "", "legal_query": "б", "web_query": "в"}"#.to_string()),
        Ok(r#"{"legal_query": "б", "web_query": "в"}"#.to_string()),
    ]);
    let pipeline = happy_pipeline(llm);

    let outputs = collect_outputs(pipeline, user_message("1. Пункт")).await;

    let errors = artifacts(&outputs);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("query synthesis failed"));
}

#[tokio::test]
async fn agent_errors_flow_into_decision_prompt() {
    let llm = ScriptedCompletion::new(vec![
        Ok(NORMALIZED.to_string()),
        Ok(QUERIES_JSON.to_string()),
        Ok(DECISION_TEXT.to_string()),
    ]);
    let pipeline = Pipeline::new(
        test_config(),
        llm.clone(),
        Arc::new(MockRetrieval { fail: true }),
        Arc::new(MockWeb {
            fail: true,
            label: "primary",
        }),
        Arc::new(MockWeb {
            fail: true,
            label: "fallback",
        }),
    );

    let outputs = collect_outputs(pipeline, user_message("1. Пункт")).await;

    // Backend failures never abort the run: the report is still produced.
    let reports = artifacts(&outputs);
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("ПУНКТ 1:"));

    // The decision prompt carried every failure as visible context.
    let calls = llm.recorded_calls();
    let decision_prompt = &calls.last().unwrap().1;
    assert_eq!(decision_prompt.matches("ОШИБКА:").count(), 3);
    assert!(decision_prompt.contains("retrieval backend unavailable"));
    assert!(decision_prompt.contains("fallback tier failed"));
}

#[tokio::test]
async fn decision_call_failure_degrades_to_abstain() {
    let llm = ScriptedCompletion::new(vec![Err("модель недоступна".to_string())]);
    let item = AgendaItem {
        number: "1".to_string(),
        title: "Итоговый анализ повестки".to_string(),
        full_text: NORMALIZED.to_string(),
    };
    let analyses = sovet::agents::AgendaAnalyses {
        internal: AnalysisResult::Error {
            query: "q".into(),
            error: "нет ВНД".into(),
            source: "internal_documents".into(),
            agent: "VND".into(),
        },
        legal: AnalysisResult::Error {
            query: "q".into(),
            error: "нет закона".into(),
            source: "legal_documents".into(),
            agent: "Legal".into(),
        },
        web: AnalysisResult::Error {
            query: "q".into(),
            error: "нет сети".into(),
            source: "web_search_fallback".into(),
            agent: "WebSearch".into(),
        },
    };

    let result = synthesize_decision(llm.as_ref(), &item, &analyses).await;
    assert_eq!(result.decision, Decision::Abstain);
    assert!(result.reasoning.contains("модель недоступна"));
    assert!(result.full_response.is_empty());
}

#[tokio::test]
async fn web_agent_falls_back_on_primary_failure() {
    let agent = PublicReactionAgent::new(
        Arc::new(MockWeb {
            fail: true,
            label: "primary",
        }),
        Arc::new(MockWeb {
            fail: false,
            label: "fallback",
        }),
        vec!["kase.kz".to_string()],
    );

    match agent.analyze("1. Пункт").await {
        AnalysisResult::Success { source, .. } => assert_eq!(source, "web_search_fallback"),
        other => panic!("expected fallback success, got {other:?}"),
    }
}

#[tokio::test]
async fn web_agent_reports_error_when_both_tiers_fail() {
    let agent = PublicReactionAgent::new(
        Arc::new(MockWeb {
            fail: true,
            label: "primary",
        }),
        Arc::new(MockWeb {
            fail: true,
            label: "fallback",
        }),
        vec!["kase.kz".to_string()],
    );

    match agent.analyze("1. Пункт").await {
        AnalysisResult::Error { source, error, .. } => {
            assert_eq!(source, "web_search_fallback");
            assert!(error.contains("fallback tier failed"));
        }
        other => panic!("expected error result, got {other:?}"),
    }
}

#[tokio::test]
async fn web_agent_tags_primary_tier_on_success() {
    let agent = PublicReactionAgent::new(
        Arc::new(MockWeb {
            fail: false,
            label: "primary",
        }),
        Arc::new(MockWeb {
            fail: false,
            label: "fallback",
        }),
        vec!["kase.kz".to_string()],
    );

    match agent.analyze("1. Пункт").await {
        AnalysisResult::Success { source, .. } => assert_eq!(source, "web_search_perplexity"),
        other => panic!("expected primary success, got {other:?}"),
    }
}
