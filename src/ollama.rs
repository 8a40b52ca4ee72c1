use std::time::Duration;

use crate::error::{Result, TutorError};

/// Shared HTTP client for Ollama-compatible chat APIs.
pub struct OllamaClient {
    pub endpoint: String,
    pub model: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

/// Parameters for a chat request to Ollama.
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub json_format: bool,
}

impl OllamaClient {
    /// The key, when present, is sent as a bearer token (hosted gateways).
    pub fn new(endpoint: String, model: String, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint,
            model,
            api_key,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Send a chat request to the Ollama API and return the response content.
    pub async fn chat(&self, request: ChatRequest) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt }
            ],
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "top_p": request.top_p
            }
        });

        if request.json_format {
            body["format"] = serde_json::json!("json");
        }

        let mut builder = self
            .client
            .post(format!("{}/api/chat", self.endpoint.trim_end_matches('/')))
            .timeout(self.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            log::warn!("Ollama API error ({}): {}", status, error_text);
            return Err(TutorError::ReasoningUnavailable(format!(
                "Ollama API returned {}",
                status
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;

        let content = response_json["message"]["content"]
            .as_str()
            .ok_or_else(|| TutorError::parse("No content in Ollama response"))?
            .to_string();

        Ok(content)
    }

    fn transport_error(&self, err: reqwest::Error) -> TutorError {
        if err.is_timeout() {
            TutorError::ReasoningTimeout(self.timeout.as_secs())
        } else {
            TutorError::ReasoningUnavailable(err.to_string())
        }
    }
}
