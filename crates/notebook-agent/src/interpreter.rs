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
use crate::memory::MemoryStore;
use crate::stage::{PayloadShape, StageTag};
use serde_json::{Map, Value};
use tracing::debug;

/// Key the notebook service expects the created notebook under.
pub const NOTEBOOK_CONTENT_KEY: &str = "notebook_content";

#[derive(Debug, Clone, PartialEq)]
pub enum NotebookPayload {
    Create(Map<String, Value>),
    Update(Vec<Value>),
}

impl NotebookPayload {
    pub fn shape(&self) -> PayloadShape {
        match self {
            NotebookPayload::Create(_) => PayloadShape::Object,
            NotebookPayload::Update(_) => PayloadShape::CellList,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadInterpreter;

impl PayloadInterpreter {
    pub fn new() -> Self {
        Self
    }

    /// Appends the round to memory, then interprets the output.
    pub fn record_and_interpret(
        &self,
        memory: &mut MemoryStore,
        stage: StageTag,
        prompt: &str,
        raw: &str,
    ) -> AgentResult<NotebookPayload> {
        memory.append(stage, prompt, raw);
        self.interpret(stage, raw)
    }

    pub fn interpret(&self, stage: StageTag, raw: &str) -> AgentResult<NotebookPayload> {
        if raw.trim().is_empty() {
            return Err(AgentError::EmptyGeneration { stage });
        }

        let value = parse_generated_json(raw).map_err(|reason| AgentError::MalformedGeneration {
            stage,
            reason,
            raw: raw.to_string(),
        })?;

        let malformed = |reason: String| AgentError::MalformedGeneration {
            stage,
            reason,
            raw: raw.to_string(),
        };

        match (stage.expected_shape(), value) {
            (PayloadShape::Object, Value::Object(object)) => {
                Ok(NotebookPayload::Create(wrap_notebook_content(object)))
            }
            (PayloadShape::CellList, Value::Array(cells)) => {
                if let Some(position) = cells.iter().position(|cell| !is_cell(cell)) {
                    return Err(malformed(format!(
                        "expected {}, found element {position} without a string \"cell_type\"",
                        PayloadShape::CellList
                    )));
                }
                debug!(stage = %stage, cells = cells.len(), "Interpreted cell list");
                Ok(NotebookPayload::Update(cells))
            }
            (expected, other) => Err(malformed(format!(
                "expected {expected}, found {}",
                describe_value(&other)
            ))),
        }
    }
}

fn parse_generated_json(raw: &str) -> Result<Value, String> {
    let parse_error = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    for (language, body) in extract_code_blocks(raw) {
        if language.as_deref() == Some("json") || language.is_none() {
            if let Ok(value) = serde_json::from_str::<Value>(&body) {
                debug!("Extracted JSON from markdown code fence");
                return Ok(value);
            }
        }
    }

    Err(format!("invalid JSON: {parse_error}"))
}

fn wrap_notebook_content(object: Map<String, Value>) -> Map<String, Value> {
    if object.contains_key(NOTEBOOK_CONTENT_KEY) {
        return object;
    }
    let mut wrapped = Map::new();
    wrapped.insert(NOTEBOOK_CONTENT_KEY.to_string(), Value::Object(object));
    wrapped
}

fn is_cell(value: &Value) -> bool {
    value
        .get("cell_type")
        .map(Value::is_string)
        .unwrap_or(false)
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a JSON array",
        Value::Object(_) => "a JSON object",
    }
}

/// Fenced markdown blocks as `(language, body)` pairs.
pub fn extract_code_blocks(text: &str) -> Vec<(Option<String>, String)> {
    let mut code_blocks = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let Some(lang_str) = line.trim().strip_prefix("```") else {
            continue;
        };
        let language = match lang_str.trim() {
            "" => None,
            lang => Some(lang.to_string()),
        };

        let mut code_content = String::new();
        for code_line in lines.by_ref() {
            if code_line.trim().starts_with("```") {
                break;
            }
            if !code_content.is_empty() {
                code_content.push('\n');
            }
            code_content.push_str(code_line);
        }
        code_blocks.push((language, code_content));
    }
    code_blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOTEBOOK: &str = r#"{"cells": [], "metadata": {}, "nbformat": 4, "nbformat_minor": 5}"#;

    #[test]
    fn test_create_wraps_object() {
        let payload = PayloadInterpreter::new()
            .interpret(StageTag::CreatingContent, NOTEBOOK)
            .unwrap();
        let NotebookPayload::Create(object) = payload else {
            panic!("expected create payload");
        };
        assert_eq!(object.len(), 1);
        assert_eq!(object[NOTEBOOK_CONTENT_KEY]["nbformat"], json!(4));
    }

    #[test]
    fn test_wrapping_is_idempotent() {
        let interpreter = PayloadInterpreter::new();
        let first = interpreter.interpret(StageTag::CreatingContent, NOTEBOOK).unwrap();
        let NotebookPayload::Create(object) = &first else {
            panic!("expected create payload");
        };
        let serialised = serde_json::to_string(object).unwrap();
        let second = interpreter
            .interpret(StageTag::CreatingContent, &serialised)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_update_leaves_cells_untouched() {
        let raw = r##"[{"cell_type": "markdown", "metadata": {}, "source": ["# Training"]},
                      {"cell_type": "code", "metadata": {}, "outputs": [], "source": ["model.fit(X, y)"]}]"##;
        let payload = PayloadInterpreter::new()
            .interpret(StageTag::Training, raw)
            .unwrap();
        let expected: Vec<Value> = serde_json::from_str(raw).unwrap();
        assert_eq!(payload, NotebookPayload::Update(expected));
        assert_eq!(payload.shape(), PayloadShape::CellList);
    }

    #[test]
    fn test_blank_output_is_empty_generation() {
        let err = PayloadInterpreter::new()
            .interpret(StageTag::CreatingContent, "  \n\t ")
            .unwrap_err();
        assert!(matches!(err, AgentError::EmptyGeneration { stage: StageTag::CreatingContent }));
    }

    #[test]
    fn test_invalid_json_keeps_raw_text() {
        let err = PayloadInterpreter::new()
            .interpret(StageTag::Preprocessing, "Sure! Here are your cells")
            .unwrap_err();
        match err {
            AgentError::MalformedGeneration { raw, reason, .. } => {
                assert_eq!(raw, "Sure! Here are your cells");
                assert!(reason.starts_with("invalid JSON"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_fenced_json_is_accepted() {
        let raw = "Here is the notebook:\n```json\n{\"cells\": []}\n```\nGood luck!";
        let payload = PayloadInterpreter::new()
            .interpret(StageTag::CreatingContent, raw)
            .unwrap();
        assert_eq!(payload.shape(), PayloadShape::Object);
    }

    #[test]
    fn test_shape_mismatches() {
        let interpreter = PayloadInterpreter::new();

        let err = interpreter
            .interpret(StageTag::CreatingContent, r#"[{"cell_type": "code"}]"#)
            .unwrap_err();
        assert!(err.details().contains("expected a JSON object, found a JSON array"));

        let err = interpreter
            .interpret(StageTag::Evaluating, r#"{"cells": []}"#)
            .unwrap_err();
        assert!(err.details().contains("found a JSON object"));

        let err = interpreter
            .interpret(StageTag::Evaluating, r#"[{"cell_type": "code"}, {"source": []}]"#)
            .unwrap_err();
        assert!(err.details().contains("element 1"));
    }

    #[test]
    fn test_record_and_interpret_appends_before_failing() {
        let mut memory = MemoryStore::new();
        let interpreter = PayloadInterpreter::new();

        assert!(interpreter
            .record_and_interpret(&mut memory, StageTag::CreatingContent, "load data", "")
            .is_err());
        assert!(interpreter
            .record_and_interpret(&mut memory, StageTag::CreatingContent, "load data", NOTEBOOK)
            .is_ok());

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.entries()[0].agent_output(), "");
        assert_eq!(memory.last_entry().unwrap().agent_output(), NOTEBOOK);
    }
}
