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

use crate::requests::GenerationConfig;
use crate::types::{LLMError, LLMResult, Provider};
use serde::{Deserialize, Serialize};

const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const OLLAMA_ENDPOINT: &str = "http://localhost:11434/api/generate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_model() -> String {
    "llama3.1".to_string()
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_timeout_seconds() -> u64 {
    120
}
fn default_api_version() -> String {
    "2023-06-01".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: None,
            temperature: None,
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
            api_version: default_api_version(),
        }
    }
}

impl BackendConfig {
    pub fn provider_kind(&self) -> Provider {
        Provider::from(self.provider.as_str())
    }

    pub fn resolved_endpoint(&self) -> LLMResult<String> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }

        match self.provider_kind() {
            Provider::Anthropic => Ok(ANTHROPIC_ENDPOINT.to_string()),
            Provider::Ollama => Ok(OLLAMA_ENDPOINT.to_string()),
            Provider::Custom(name) => Err(LLMError::Configuration(format!(
                "provider '{name}' has no default endpoint; set llm.endpoint"
            ))),
        }
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            max_tokens: Some(self.max_tokens),
            temperature: self.temperature.or(GenerationConfig::default().temperature),
            ..GenerationConfig::default()
        }
    }
}
