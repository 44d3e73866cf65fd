//! Boundary types for the external data agent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Request envelope for one question, serialized as `{"input": "..."}`.
/// The analyst prompt announces this exact shape to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentQuery {
    pub input: String,
}

impl AgentQuery {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("api status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("unparseable reply: {0}")]
    Parse(String),
    #[error("empty reply")]
    Empty,
}

/// Normalized agent reply.
///
/// `Structured` means the reply was a JSON mapping carrying an `output` key
/// (key presence is enough; extra keys do not matter). Anything else lands in
/// `Raw` untouched. Both render through [`AgentAnswer::into_text`] the same
/// way, so `{"output": "X"}` and a bare `"X"` are indistinguishable to the
/// caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentAnswer {
    Structured { text: String },
    Raw { value: Value },
}

impl AgentAnswer {
    /// Classify an already-decoded reply value.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(ref map) if map.contains_key("output") => {
                let text = match &map["output"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                AgentAnswer::Structured { text }
            }
            other => AgentAnswer::Raw { value: other },
        }
    }

    /// Decode raw model text, stripping code fences first. Text that is not
    /// JSON at all is a parse failure the caller may re-ask about.
    pub fn parse(reply: &str) -> Result<Self, AgentError> {
        let trimmed = reply
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        if trimmed.is_empty() {
            return Err(AgentError::Empty);
        }
        let value: Value = serde_json::from_str(trimmed)
            .map_err(|e| AgentError::Parse(format!("{}; reply was: {}", e, snippet(trimmed))))?;
        Ok(Self::from_value(value))
    }

    /// Plain text for display.
    pub fn into_text(self) -> String {
        match self {
            AgentAnswer::Structured { text } => text,
            AgentAnswer::Raw { value } => match value {
                Value::String(s) => s,
                other => other.to_string(),
            },
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, AgentAnswer::Structured { .. })
    }
}

fn snippet(s: &str) -> String {
    const LIMIT: usize = 120;
    if s.chars().count() <= LIMIT {
        s.to_string()
    } else {
        let head: String = s.chars().take(LIMIT).collect();
        format!("{}…", head)
    }
}

/// Seam between the service and whichever agent answers questions.
///
/// One question in, one normalized answer out. The call blocks until the
/// agent settles; any reasoning rounds happen behind it.
#[async_trait]
pub trait DataAgent: Send + Sync {
    async fn ask(&self, query: &AgentQuery) -> Result<AgentAnswer, AgentError>;

    /// Provider label for logs and the info endpoint.
    fn provider(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_envelope_becomes_structured() {
        let answer = AgentAnswer::from_value(json!({"output": "42 filas"}));
        assert_eq!(
            answer,
            AgentAnswer::Structured {
                text: "42 filas".into()
            }
        );
    }

    #[test]
    fn key_presence_is_enough() {
        // Extra keys alongside "output" still count as the envelope
        let answer = AgentAnswer::from_value(json!({"input": "¿cuántas?", "output": "50"}));
        assert!(answer.is_structured());
        assert_eq!(answer.into_text(), "50");
    }

    #[test]
    fn non_string_output_is_stringified() {
        assert_eq!(
            AgentAnswer::from_value(json!({"output": 42})).into_text(),
            "42"
        );
        assert_eq!(
            AgentAnswer::from_value(json!({"output": null})).into_text(),
            "null"
        );
    }

    #[test]
    fn envelope_and_bare_string_render_identically() {
        let wrapped = AgentAnswer::from_value(json!({"output": "X"}));
        let bare = AgentAnswer::from_value(json!("X"));
        assert!(wrapped.is_structured());
        assert!(!bare.is_structured());
        assert_eq!(wrapped.into_text(), bare.into_text());
    }

    #[test]
    fn fenced_replies_are_unwrapped() {
        let answer = AgentAnswer::parse("```json\n{\"output\": \"listo\"}\n```").unwrap();
        assert_eq!(answer.into_text(), "listo");
    }

    #[test]
    fn prose_is_a_parse_failure() {
        let err = AgentAnswer::parse("The table has 50 rows.").unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
    }

    #[test]
    fn other_json_shapes_stay_raw() {
        let answer = AgentAnswer::parse("[1, 2, 3]").unwrap();
        assert_eq!(
            answer,
            AgentAnswer::Raw {
                value: json!([1, 2, 3])
            }
        );
        assert_eq!(answer.into_text(), "[1,2,3]");
    }
}
