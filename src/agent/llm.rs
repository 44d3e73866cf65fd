//! Chat-completions client for the OpenAI-compatible Groq API.

use super::traits::AgentError;
use crate::config::AgentConfig;
use crate::credential::ApiKey;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

/// One configured model endpoint plus the credential that unlocks it.
#[derive(Debug)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout_ms: u64,
    max_retries: u32,
    retry_delay_ms: u64,
    api_key: ApiKey,
}

impl LlmClient {
    pub fn new(cfg: &AgentConfig, api_key: ApiKey) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            timeout_ms: cfg.timeout_ms,
            max_retries: cfg.max_retries.max(1),
            retry_delay_ms: cfg.retry_delay_ms.max(1),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Place one chat exchange and return the assistant text.
    ///
    /// Transient failures (network, 429, 5xx) retry with exponential backoff;
    /// other client errors return immediately since a retry cannot heal them.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        json_object: bool,
    ) -> Result<String, AgentError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if json_object {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        let url = format!("{}/chat/completions", self.base_url);

        let mut last_err: Option<AgentError> = None;
        for i in 0..self.max_retries {
            let send_res = self
                .client
                .post(&url)
                .bearer_auth(self.api_key.expose())
                .json(&body)
                .send()
                .await;

            let response = match send_res {
                Ok(resp) => resp,
                Err(e) => {
                    last_err = Some(if e.is_timeout() {
                        AgentError::Timeout {
                            timeout_ms: self.timeout_ms,
                        }
                    } else {
                        AgentError::Transport(e.to_string())
                    });
                    let delay_ms = self.retry_delay_ms * (1u64 << i);
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                let err = AgentError::Api {
                    status: status.as_u16(),
                    message: error_text,
                };
                if status.is_client_error() && status.as_u16() != 429 {
                    return Err(err);
                }
                last_err = Some(err);
                let delay_ms = self.retry_delay_ms * (1u64 << i);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                continue;
            }

            let parse_res: Result<Value, reqwest::Error> = response.json().await;
            match parse_res {
                Ok(v) => match v["choices"][0]["message"]["content"].as_str() {
                    Some(text) if !text.trim().is_empty() => return Ok(text.to_string()),
                    _ => last_err = Some(AgentError::Empty),
                },
                Err(e) => {
                    last_err = Some(AgentError::Parse(format!("response body: {}", e)));
                }
            }
            let delay_ms = self.retry_delay_ms * (1u64 << i);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        Err(last_err.unwrap_or(AgentError::Empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialize_with_their_roles() {
        let rendered = serde_json::to_value([
            ChatMessage::system("instrucciones"),
            ChatMessage::user("pregunta"),
            ChatMessage::assistant("respuesta"),
        ])
        .unwrap();
        assert_eq!(rendered[0]["role"], "system");
        assert_eq!(rendered[1]["role"], "user");
        assert_eq!(rendered[2]["content"], "respuesta");
    }

    #[test]
    fn base_url_loses_its_trailing_slash() {
        let mut cfg = AgentConfig::default();
        cfg.base_url = "https://api.groq.com/openai/v1/".to_string();
        let key = ApiKey::new("gsk-0123456789abcdef").unwrap();
        let client = LlmClient::new(&cfg, key).unwrap();
        assert_eq!(client.base_url, "https://api.groq.com/openai/v1");
    }
}
