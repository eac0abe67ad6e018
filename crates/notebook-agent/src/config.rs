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

use crate::error::{AgentError, AgentResult};
use crate::orchestrator::PipelineSettings;
use crate::prompts::InitialTemplate;
use llm_contracts::BackendConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const ENV_MAX_REPAIRS: &str = "NOTEBOOK_AGENT_MAX_REPAIRS";
pub const ENV_SERVICE_URL: &str = "NOTEBOOK_SERVICE_URL";
pub const ENV_LLM_PROVIDER: &str = "LLM_PROVIDER";
pub const ENV_LLM_MODEL: &str = "LLM_MODEL";
pub const ENV_LLM_ENDPOINT: &str = "LLM_ENDPOINT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub llm: BackendConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Required; there is no built-in repair budget.
    #[serde(default)]
    pub max_repair_attempts: Option<u32>,
    #[serde(default)]
    pub initial_template: InitialTemplate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl AgentConfig {
    pub fn from_toml_str(content: &str) -> AgentResult<Self> {
        toml::from_str(content)
            .map_err(|e| AgentError::Configuration(format!("Failed to parse config: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Configuration(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Loads `path` when given, otherwise starts from defaults, then
    /// applies environment overrides.
    pub fn load_with_env(path: Option<&Path>) -> AgentResult<Self> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()
    }

    pub fn apply_env_overrides(self) -> AgentResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn with_overrides_from<F>(mut self, lookup: F) -> AgentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_REPAIRS) {
            let attempts = value.trim().parse::<u32>().map_err(|e| {
                AgentError::Configuration(format!("{ENV_MAX_REPAIRS}='{value}' is not a count: {e}"))
            })?;
            debug!(max_repair_attempts = attempts, "Override from environment");
            self.pipeline.max_repair_attempts = Some(attempts);
        }
        if let Some(value) = lookup(ENV_SERVICE_URL) {
            self.service.base_url = value;
        }
        if let Some(value) = lookup(ENV_LLM_PROVIDER) {
            self.llm.provider = value;
        }
        if let Some(value) = lookup(ENV_LLM_MODEL) {
            self.llm.model = value;
        }
        if let Some(value) = lookup(ENV_LLM_ENDPOINT) {
            self.llm.endpoint = Some(value);
        }
        Ok(self)
    }

    pub fn pipeline_settings(&self) -> AgentResult<PipelineSettings> {
        let max_repair_attempts = self.pipeline.max_repair_attempts.ok_or_else(|| {
            AgentError::Configuration(format!(
                "pipeline.max_repair_attempts is required (or set {ENV_MAX_REPAIRS})"
            ))
        })?;

        Ok(PipelineSettings::new(max_repair_attempts)
            .with_initial_template(self.pipeline.initial_template)
            .with_generation_config(self.llm.generation_config()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_full_config() {
        let config = AgentConfig::from_toml_str(
            r#"
            [pipeline]
            max_repair_attempts = 3
            initial_template = "full_notebook"

            [service]
            base_url = "http://notebooks:9000"

            [llm]
            provider = "anthropic"
            model = "claude-3-5-haiku-latest"
            temperature = 0.2
            "#,
        )
        .unwrap();

        let settings = config.pipeline_settings().unwrap();
        assert_eq!(settings.max_repair_attempts, 3);
        assert_eq!(settings.initial_template, InitialTemplate::FullNotebook);
        assert_eq!(settings.generation.temperature, Some(0.2));
        assert_eq!(config.service.base_url, "http://notebooks:9000");
        assert_eq!(config.service.timeout_seconds, 120);
        assert_eq!(config.llm.max_tokens, 8192);
    }

    #[test]
    fn test_missing_cap_is_rejected() {
        let config = AgentConfig::from_toml_str("[service]\nbase_url = \"http://x\"").unwrap();
        assert_eq!(config.pipeline.initial_template, InitialTemplate::DataLoading);
        assert!(matches!(
            config.pipeline_settings(),
            Err(AgentError::Configuration(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_MAX_REPAIRS, "2"),
            (ENV_SERVICE_URL, "http://svc:8000"),
            (ENV_LLM_PROVIDER, "anthropic"),
            (ENV_LLM_MODEL, "claude-3-5-sonnet-latest"),
        ]
        .into_iter()
        .collect();

        let config = AgentConfig::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.pipeline.max_repair_attempts, Some(2));
        assert_eq!(config.service.base_url, "http://svc:8000");
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.model, "claude-3-5-sonnet-latest");
        assert_eq!(config.llm.endpoint, None);
    }

    #[test]
    fn test_bad_env_cap() {
        let result = AgentConfig::default()
            .with_overrides_from(|key| (key == ENV_MAX_REPAIRS).then(|| "three".to_string()));
        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(AgentConfig::from_toml_str("[pipeline\nmax").is_err());
    }
}
