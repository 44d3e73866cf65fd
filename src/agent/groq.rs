//! Groq-backed data agent: the whole table travels in the system prompt and
//! each question is one blocking exchange, re-asked within the iteration
//! budget when the reply does not decode.

use super::llm::{ChatMessage, LlmClient};
use super::traits::{AgentAnswer, AgentError, AgentQuery, DataAgent};
use crate::config::{AgentConfig, AgentStyle};
use crate::credential::ApiKey;
use crate::error::{Result, SheetMindError};
use crate::prompt;
use crate::table::Table;
use async_trait::async_trait;

/// Correction sent when a reply could not be decoded and re-asking is allowed.
const FORMAT_REMINDER: &str = "Your previous reply was not a valid JSON object. \
Reply with exactly one JSON object of the form {\"output\": \"<answer>\"} and \
nothing else.";

#[derive(Debug)]
pub struct GroqAgent {
    llm: LlmClient,
    system_prompt: String,
    json_mode: bool,
    max_iterations: u32,
    handle_parsing_errors: bool,
}

impl GroqAgent {
    /// Bind the model endpoint to one table.
    ///
    /// Refuses to construct unless `allow_dangerous_code` is set: the agent
    /// decides on its own what analysis to run over the table contents.
    pub fn new(
        cfg: &AgentConfig,
        api_key: ApiKey,
        table: &Table,
        max_prompt_bytes: usize,
    ) -> Result<Self> {
        if !cfg.allow_dangerous_code {
            return Err(SheetMindError::Validation {
                message: "agent.allow_dangerous_code is disabled; enable it to let the data agent \
                          run generated analysis over the table"
                    .to_string(),
            });
        }
        let llm = LlmClient::new(cfg, api_key).map_err(|e| SheetMindError::Agent {
            message: e.to_string(),
        })?;

        let (rows, cols) = table.shape();
        let template = match cfg.style {
            AgentStyle::ToolCalling => prompt::ANALYST_TOOL_CALLING,
            AgentStyle::React => prompt::ANALYST_REACT,
        };
        let table_text = table.to_delimited(max_prompt_bytes)?;
        let system_prompt = prompt::render(
            template,
            &[
                ("rows", &rows.to_string()),
                ("cols", &cols.to_string()),
                ("columns", &table.columns.join(", ")),
                ("table", &table_text),
                ("max_iterations", &cfg.max_iterations.to_string()),
            ],
        );

        Ok(Self {
            llm,
            system_prompt,
            json_mode: cfg.style == AgentStyle::ToolCalling,
            max_iterations: cfg.max_iterations.max(1),
            handle_parsing_errors: cfg.handle_parsing_errors,
        })
    }
}

#[async_trait]
impl DataAgent for GroqAgent {
    async fn ask(&self, query: &AgentQuery) -> std::result::Result<AgentAnswer, AgentError> {
        let payload =
            serde_json::to_string(query).map_err(|e| AgentError::Parse(e.to_string()))?;
        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(payload),
        ];

        let rounds = if self.handle_parsing_errors {
            self.max_iterations
        } else {
            1
        };
        let mut last_err = AgentError::Empty;
        for round in 0..rounds {
            let reply = self.llm.chat(&messages, self.json_mode).await?;
            match AgentAnswer::parse(&reply) {
                Ok(answer) => {
                    if round > 0 {
                        tracing::debug!(rounds = round + 1, "agent settled after re-asking");
                    }
                    return Ok(answer);
                }
                Err(e) => {
                    tracing::debug!(round, error = %e, "agent reply did not decode");
                    last_err = e;
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(FORMAT_REMINDER));
                }
            }
        }
        Err(last_err)
    }

    fn provider(&self) -> &'static str {
        "groq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use std::path::PathBuf;

    fn sample_table() -> Table {
        Table {
            path: PathBuf::from("empleados.xlsx"),
            sheet: Some("Hoja1".into()),
            columns: vec!["nombre".into(), "salario".into()],
            rows: vec![
                vec![Cell::Text("Ana".into()), Cell::Float(30500.0)],
                vec![Cell::Text("Luis".into()), Cell::Float(28900.0)],
            ],
        }
    }

    fn key() -> ApiKey {
        ApiKey::new("gsk-0123456789abcdef").unwrap()
    }

    #[test]
    fn refuses_without_dangerous_code_opt_in() {
        let cfg = AgentConfig {
            allow_dangerous_code: false,
            ..AgentConfig::default()
        };
        let err = GroqAgent::new(&cfg, key(), &sample_table(), 10_000).unwrap_err();
        assert!(matches!(err, SheetMindError::Validation { .. }));
    }

    #[test]
    fn system_prompt_carries_shape_and_data() {
        let agent =
            GroqAgent::new(&AgentConfig::default(), key(), &sample_table(), 10_000).unwrap();
        assert!(agent.system_prompt.contains("2 rows x 2 columns"));
        assert!(agent.system_prompt.contains("nombre, salario"));
        assert!(agent.system_prompt.contains("Ana,30500"));
        // All placeholders must be gone
        assert!(!agent.system_prompt.contains("{{"));
    }

    #[test]
    fn style_selects_template_and_json_mode() {
        let single =
            GroqAgent::new(&AgentConfig::default(), key(), &sample_table(), 10_000).unwrap();
        assert!(single.json_mode);

        let cfg = AgentConfig {
            style: AgentStyle::React,
            max_iterations: 7,
            ..AgentConfig::default()
        };
        let react = GroqAgent::new(&cfg, key(), &sample_table(), 10_000).unwrap();
        assert!(!react.json_mode);
        assert!(react.system_prompt.contains("at most 7 internal rounds"));
    }
}
