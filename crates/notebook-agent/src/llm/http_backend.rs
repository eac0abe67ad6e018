// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use async_trait::async_trait;
use llm_contracts::{
    BackendConfig, GenerationBackend, LLMError, LLMRequest, LLMResponse, LLMResult, Provider,
    Usage,
};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Generation backend speaking either the Anthropic messages API or the
/// Ollama generate API.
#[derive(Debug, Clone)]
pub struct HttpGenerationBackend {
    client: Client,
    provider: Provider,
    endpoint: String,
    model: String,
    api_version: String,
    api_key: Option<String>,
    timeout_seconds: u64,
    name: String,
}

impl HttpGenerationBackend {
    pub fn from_config(config: &BackendConfig) -> LLMResult<Self> {
        let provider = config.provider_kind();
        if let Provider::Custom(name) = &provider {
            return Err(LLMError::Configuration(format!(
                "unsupported provider '{name}'; expected anthropic or ollama"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LLMError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            name: format!("{provider}:{}", config.model),
            provider,
            endpoint: config.resolved_endpoint()?,
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            api_key: None,
            timeout_seconds: config.timeout_seconds,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn anthropic_api_key(&self) -> LLMResult<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        std::env::var(ANTHROPIC_API_KEY_ENV).map_err(|_| {
            LLMError::Authentication(format!("{ANTHROPIC_API_KEY_ENV} is not set"))
        })
    }

    fn build_anthropic_payload(&self, request: &LLMRequest) -> Value {
        let config = &request.generation_config;
        let mut payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "max_tokens": config.max_tokens.unwrap_or(4096),
        });

        if let Some(system) = &request.system_prompt {
            payload["system"] = json!(system);
        }
        if let Some(temperature) = config.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(top_p) = config.top_p {
            payload["top_p"] = json!(top_p);
        }
        if let Some(stop) = &config.stop_sequences {
            payload["stop_sequences"] = json!(stop);
        }
        payload
    }

    fn build_ollama_payload(&self, request: &LLMRequest) -> Value {
        let config = &request.generation_config;
        let mut options = serde_json::Map::new();
        if let Some(max_tokens) = config.max_tokens {
            options.insert("num_predict".into(), json!(max_tokens));
        }
        if let Some(temperature) = config.temperature {
            options.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_p) = config.top_p {
            options.insert("top_p".into(), json!(top_p));
        }
        if let Some(stop) = &config.stop_sequences {
            options.insert("stop".into(), json!(stop));
        }

        let mut payload = json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "options": options,
        });
        if let Some(system) = &request.system_prompt {
            payload["system"] = json!(system);
        }
        payload
    }

    fn parse_anthropic_response(data: &Value) -> LLMResult<(String, Usage)> {
        let content = data["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| block["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| {
                LLMError::Provider("Failed to extract content from Anthropic response".to_string())
            })?;

        let usage = Usage::new(
            data["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            data["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        );
        Ok((content, usage))
    }

    fn parse_ollama_response(data: &Value) -> LLMResult<(String, Usage)> {
        let content = data["response"].as_str().ok_or_else(|| {
            LLMError::Provider("Failed to extract content from Ollama response".to_string())
        })?;

        let usage = Usage::new(
            data["prompt_eval_count"].as_u64().unwrap_or(0) as u32,
            data["eval_count"].as_u64().unwrap_or(0) as u32,
        );
        Ok((content.to_string(), usage))
    }

    async fn post(&self, payload: &Value) -> LLMResult<Value> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json");
        if self.provider == Provider::Anthropic {
            builder = builder
                .header("x-api-key", self.anthropic_api_key()?)
                .header("anthropic-version", &self.api_version);
        }

        let response = builder.json(payload).send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(backend = %self.name, "Generation request timed out");
                LLMError::Timeout {
                    seconds: self.timeout_seconds,
                }
            } else {
                LLMError::Network(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        info!(backend = %self.name, status = %status, "Received response from generation backend");

        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| {
                LLMError::Serialisation(format!("Failed to parse JSON response: {e}"))
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                LLMError::Authentication(format!("{status}: {body}"))
            }
            StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimit,
            _ => LLMError::Provider(format!("{} API error {status}: {body}", self.provider)),
        })
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(&self, request: LLMRequest) -> LLMResult<LLMResponse> {
        let started = Instant::now();
        let payload = match self.provider {
            Provider::Anthropic => self.build_anthropic_payload(&request),
            _ => self.build_ollama_payload(&request),
        };
        debug!(backend = %self.name, request_id = %request.id, "Sending generation request");

        let data = self.post(&payload).await?;
        let (content, usage) = match self.provider {
            Provider::Anthropic => Self::parse_anthropic_response(&data)?,
            _ => Self::parse_ollama_response(&data)?,
        };

        Ok(
            LLMResponse::new(request.id, content, self.model.clone(), self.provider.to_string())
                .with_usage(usage)
                .with_processing_time(started.elapsed().as_millis() as u64),
        )
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_contracts::GenerationConfig;

    fn config(provider: &str) -> BackendConfig {
        BackendConfig {
            provider: provider.to_string(),
            model: "test-model".to_string(),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn test_custom_provider_is_rejected() {
        assert!(matches!(
            HttpGenerationBackend::from_config(&config("bedrock")),
            Err(LLMError::Configuration(_))
        ));
    }

    #[test]
    fn test_anthropic_payload() {
        let backend = HttpGenerationBackend::from_config(&config("anthropic")).unwrap();
        let request = LLMRequest::new("write cells")
            .with_system_prompt("you write notebooks")
            .with_generation_config(GenerationConfig {
                max_tokens: Some(1000),
                ..GenerationConfig::default()
            });

        let payload = backend.build_anthropic_payload(&request);
        assert_eq!(payload["model"], "test-model");
        assert_eq!(payload["system"], "you write notebooks");
        assert_eq!(payload["messages"][0]["content"], "write cells");
        assert_eq!(payload["max_tokens"], 1000);
    }

    #[test]
    fn test_ollama_payload() {
        let backend = HttpGenerationBackend::from_config(&config("ollama")).unwrap();
        let payload = backend.build_ollama_payload(&LLMRequest::new("write cells"));
        assert_eq!(payload["prompt"], "write cells");
        assert_eq!(payload["stream"], false);
        assert!(payload.get("system").is_none());
    }

    #[test]
    fn test_parse_responses() {
        let (content, usage) = HttpGenerationBackend::parse_anthropic_response(&json!({
            "content": [{"type": "text", "text": "[]"}],
            "usage": {"input_tokens": 10, "output_tokens": 2}
        }))
        .unwrap();
        assert_eq!(content, "[]");
        assert_eq!(usage.total_tokens, 12);

        let (content, _) =
            HttpGenerationBackend::parse_ollama_response(&json!({"response": "{}", "done": true}))
                .unwrap();
        assert_eq!(content, "{}");

        assert!(HttpGenerationBackend::parse_ollama_response(&json!({"error": "x"})).is_err());
    }
}
