// src/pipeline/normalizer.rs

//! Validated, retried normalization of raw agenda text into the canonical
//! numbered-item format. Either returns structurally valid text or fails the
//! run — there is no partial-success path.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::backend::CompletionBackend;
use crate::error::PipelineError;

static ITEM_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(\d+)\.\s").unwrap());

const SYSTEM_PROMPT: &str = "Вы — редактор повесток дня. Преобразуйте входной документ в чистый список пунктов. \
Верните ТОЛЬКО текст без пояснений и без кодовых блоков. Формат: каждый пункт начинается с 'N. ' (1., 2., 3., ...), \
первая строка — краткий заголовок, затем при наличии последующие строки с деталями до следующего номера. \
Удалите нерелевантные блоки (шапки, подписи, приложения). Сохраните существенные формулировки.";

/// Rewrite raw free-form agenda text into the canonical `N. ` format.
pub async fn normalize(
    llm: &dyn CompletionBackend,
    raw_text: &str,
    max_attempts: usize,
) -> Result<String, PipelineError> {
    let base_text = raw_text.replace("\r\n", "\n").replace('\r', "\n");
    let user_prompt = format!(
        "Исходный текст повестки ниже. Преобразуйте его согласно требованиям.\n\n{}",
        base_text
    );

    let mut last_cause = String::from("no attempts made");
    for attempt in 1..=max_attempts {
        match llm.complete(Some(SYSTEM_PROMPT), &user_prompt).await {
            Ok(raw) => {
                let candidate = strip_code_fence(&raw);
                match validate(candidate) {
                    Ok(()) => return Ok(candidate.to_string()),
                    Err(cause) => {
                        warn!("normalization attempt {attempt} rejected: {cause}");
                        last_cause = cause;
                    }
                }
            }
            Err(e) => {
                warn!("normalization attempt {attempt} errored: {e}");
                last_cause = e.to_string();
            }
        }
    }

    Err(PipelineError::NormalizationFailed {
        attempts: max_attempts,
        cause: last_cause,
    })
}

/// Canonical-format rules: at least one `N. ` line, and numbering starts at 1.
fn validate(text: &str) -> Result<(), String> {
    let numbers: Vec<u64> = ITEM_NUMBER
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();

    if numbers.is_empty() {
        return Err("result contains no numbered items 'N.'".to_string());
    }
    if numbers[0] != 1 {
        return Err("numbering does not start at 1".to_string());
    }
    Ok(())
}

/// Models wrap plain text in markdown fences often enough to handle here.
fn strip_code_fence(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```text")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
