// src/error.rs

use thiserror::Error;

/// Fatal stage failures. Everything else in the pipeline degrades locally:
/// agent errors become `AnalysisResult::Error`, synthesis errors become an
/// abstain verdict. Only these two abort a run (and are then converted into
/// an error artifact at the orchestrator boundary).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("agenda normalization failed after {attempts} attempts: {cause}")]
    NormalizationFailed { attempts: usize, cause: String },

    #[error("agent query synthesis failed after {attempts} attempts: {cause}")]
    QuerySynthesisFailed { attempts: usize, cause: String },
}
