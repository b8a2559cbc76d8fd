//! Parsing of the worker CLI's JSON envelope into a validated payload.
//!
//! The worker prints a JSON envelope on stdout. The structured payload
//! lives under `structured_output`; an `is_error` flag with a `result`
//! message means the worker itself failed. Every malformed shape maps
//! to a distinct [`OutputError`] so the supervisor can report precisely
//! what went wrong.

use serde_json::Value;
use thiserror::Error;

use crate::core::types::{WorkerOutput, WorkerStatus};

/// Envelope key holding the validated payload.
pub const PAYLOAD_KEY: &str = "structured_output";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutputError {
    #[error("worker produced no output")]
    Empty,
    #[error("worker output is not valid JSON: {0}")]
    Malformed(String),
    #[error("worker failed: {0}")]
    WorkerFailed(String),
    #[error("worker output has no `structured_output` payload (got keys: {})", got.join(", "))]
    MissingPayload { got: Vec<String> },
    #[error("worker payload is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("worker payload has invalid status `{0}` (expected ONGOING, FINISH, or BLOCKED)")]
    InvalidStatus(String),
    #[error("worker payload field `{field}` must be a string (got {value})")]
    InvalidField {
        field: &'static str,
        value: String,
    },
}

/// Parse raw worker stdout into a validated [`WorkerOutput`].
///
/// Checks are ordered: emptiness, JSON well-formedness, the worker's
/// own error flag, payload presence, then field validation.
pub fn parse_worker_output(raw: &str) -> Result<WorkerOutput, OutputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OutputError::Empty);
    }

    let envelope: Value =
        serde_json::from_str(trimmed).map_err(|err| OutputError::Malformed(err.to_string()))?;

    if envelope
        .get("is_error")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        let message = envelope
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(OutputError::WorkerFailed(message));
    }

    let Some(payload) = envelope.get(PAYLOAD_KEY) else {
        let got = match &envelope {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        };
        return Err(OutputError::MissingPayload { got });
    };

    let status_value = payload
        .get("status")
        .ok_or(OutputError::MissingField("status"))?;
    let summary_value = payload
        .get("summary")
        .ok_or(OutputError::MissingField("summary"))?;

    let status = status_value
        .as_str()
        .and_then(WorkerStatus::parse)
        .ok_or_else(|| OutputError::InvalidStatus(render_value(status_value)))?;

    let summary = summary_value
        .as_str()
        .ok_or_else(|| OutputError::InvalidField {
            field: "summary",
            value: render_value(summary_value),
        })?;

    Ok(WorkerOutput {
        status,
        summary: summary.to_string(),
        blocker: payload
            .get("blocker")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
