//! Reqforge LLM provider infrastructure adapter.
//!
//! Implements the [`pipeline::LlmProvider`] port for Anthropic's Messages API.
//! Additional providers are added as new types in this crate without any
//! changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, and response
//! parsing live here. The client is deliberately blocking: generation calls
//! run on dedicated worker threads that are allowed to wait minutes for a
//! completion, and must never run on the broker control loop.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use pipeline::{GenerateOptions, LlmError, LlmProvider, TokenUsage};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Generous ceiling for one generation call; requirement synthesis over a
/// large contract can legitimately take several minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Blocking Anthropic Messages API client.
pub struct AnthropicProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    /// Creates a provider for the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| LlmError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

impl LlmProvider for AnthropicProvider {
    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<(String, TokenUsage), LlmError> {
        let body = json!({
            "model": self.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "system": system_prompt,
            "messages": [{ "role": "user", "content": user_prompt }],
        });

        debug!(model = %self.model, max_tokens = options.max_tokens, "sending generation request");
        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .map_err(|err| LlmError::MalformedResponse(err.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: payload["error"]["message"]
                    .as_str()
                    .unwrap_or("no error message provided")
                    .to_owned(),
            });
        }

        parse_response(&payload)
    }
}

/// Extracts the completion text and token accounting from a Messages API
/// response body.
fn parse_response(payload: &Value) -> Result<(String, TokenUsage), LlmError> {
    let blocks = payload["content"].as_array().ok_or_else(|| {
        LlmError::MalformedResponse("response has no content array".to_owned())
    })?;

    let text: String = blocks
        .iter()
        .filter(|block| block["type"] == "text")
        .filter_map(|block| block["text"].as_str())
        .collect();
    if text.is_empty() {
        return Err(LlmError::MalformedResponse(
            "response contained no text blocks".to_owned(),
        ));
    }

    let usage = TokenUsage {
        input_tokens: payload["usage"]["input_tokens"].as_u64().unwrap_or(0),
        output_tokens: payload["usage"]["output_tokens"].as_u64().unwrap_or(0),
    };
    Ok((text, usage))
}
