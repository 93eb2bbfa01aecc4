// src/pipeline/events.rs

//! Progress/result values the pipeline emits through its channel sink.
//!
//! Status events serialize to the wire shape consumers expect:
//! `{"event":{"type":"status","data":{"description":"...","done":true}}}`.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEvent {
    pub event: EventBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: StatusData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusData {
    pub description: String,
    pub done: bool,
}

impl StatusEvent {
    pub fn status(description: impl Into<String>) -> Self {
        Self {
            event: EventBody {
                kind: "status".to_string(),
                data: StatusData {
                    description: description.into(),
                    done: true,
                },
            },
        }
    }

    /// The terminal event: empty description, guaranteed last value of a run.
    pub fn terminal() -> Self {
        Self::status("")
    }

    pub fn description(&self) -> &str {
        &self.event.data.description
    }
}

/// A value in the pipeline's output stream: either a progress event or an
/// artifact (the rendered report, or an error string on fatal failure).
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    Status(StatusEvent),
    Artifact(String),
}
