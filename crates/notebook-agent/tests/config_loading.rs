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

use notebook_agent::{AgentConfig, AgentError, InitialTemplate};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(
        r#"
        [pipeline]
        max_repair_attempts = 4

        [service]
        base_url = "http://notebook-service:8000"
        timeout_seconds = 30

        [llm]
        provider = "ollama"
        model = "qwen2.5-coder"
        endpoint = "http://gpu-box:11434/api/generate"
        "#,
    );

    let config = AgentConfig::load(file.path()).unwrap();
    let settings = config.pipeline_settings().unwrap();

    assert_eq!(settings.max_repair_attempts, 4);
    assert_eq!(settings.initial_template, InitialTemplate::DataLoading);
    assert_eq!(config.service.timeout_seconds, 30);
    assert_eq!(config.llm.model, "qwen2.5-coder");
    assert_eq!(
        config.llm.resolved_endpoint().unwrap(),
        "http://gpu-box:11434/api/generate"
    );
}

#[test]
fn test_file_values_overridden_by_environment() {
    let file = write_config("[pipeline]\nmax_repair_attempts = 4\n");

    let config = AgentConfig::load(file.path())
        .unwrap()
        .with_overrides_from(|key| match key {
            "NOTEBOOK_AGENT_MAX_REPAIRS" => Some("1".to_string()),
            "LLM_ENDPOINT" => Some("http://localhost:9999/api/generate".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.pipeline.max_repair_attempts, Some(1));
    assert_eq!(
        config.llm.endpoint.as_deref(),
        Some("http://localhost:9999/api/generate")
    );
    assert_eq!(config.service.base_url, "http://localhost:8000");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = AgentConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, AgentError::Configuration(ref msg) if msg.contains("absent.toml")));
}

#[test]
fn test_unknown_template_is_rejected() {
    let file = write_config("[pipeline]\nmax_repair_attempts = 1\ninitial_template = \"poetry\"\n");
    assert!(matches!(
        AgentConfig::load(file.path()),
        Err(AgentError::Configuration(_))
    ));
}
