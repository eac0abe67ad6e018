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

#![allow(dead_code)]

use async_trait::async_trait;
use llm_contracts::{GenerationBackend, LLMError, LLMRequest, LLMResponse, LLMResult};
use notebook_agent::{AgentError, AgentResult, DatasetLookup, DatasetMetadata, NotebookActions, OperationResult};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const NOTEBOOK: &str =
    r#"{"cells": [{"cell_type": "code", "metadata": {}, "outputs": [], "source": ["import pandas as pd"]}], "metadata": {}, "nbformat": 4, "nbformat_minor": 5}"#;
pub const CELLS: &str = r#"[{"cell_type": "code", "metadata": {}, "outputs": [], "source": ["df = df.dropna()"]}]"#;

/// Backend returning queued outputs in order. Once the queue is drained it
/// keeps answering with `fallback`.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<LLMResult<String>>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: String::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn with_error(self, error: LLMError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_fallback(mut self, text: &str) -> Self {
        self.fallback = text.to_string();
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, request: LLMRequest) -> LLMResult<LLMResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        next.map(|text| LLMResponse::new(request.id, text, "scripted", "test"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotebookCall {
    Create { target: String, content: Map<String, Value> },
    Update { target: String, cells: Vec<Value> },
}

/// Notebook service answering with queued results, `Success` once drained.
#[derive(Default)]
pub struct ScriptedNotebook {
    results: Mutex<VecDeque<OperationResult>>,
    calls: Mutex<Vec<NotebookCall>>,
}

impl ScriptedNotebook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(self, result: OperationResult) -> Self {
        self.results.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<NotebookCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next_result(&self) -> OperationResult {
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(OperationResult::success)
    }
}

#[async_trait]
impl NotebookActions for ScriptedNotebook {
    async fn create(&self, target_name: &str, content: &Map<String, Value>) -> OperationResult {
        self.calls.lock().unwrap().push(NotebookCall::Create {
            target: target_name.to_string(),
            content: content.clone(),
        });
        self.next_result()
    }

    async fn update(&self, target_name: &str, cells: &[Value]) -> OperationResult {
        self.calls.lock().unwrap().push(NotebookCall::Update {
            target: target_name.to_string(),
            cells: cells.to_vec(),
        });
        self.next_result()
    }
}

pub struct StaticDatasets(pub Option<DatasetMetadata>);

#[async_trait]
impl DatasetLookup for StaticDatasets {
    async fn lookup(&self, search_term: &str) -> AgentResult<DatasetMetadata> {
        self.0
            .clone()
            .ok_or_else(|| AgentError::DatasetLookup(format!("no dataset matches '{search_term}'")))
    }
}

pub fn titanic() -> DatasetMetadata {
    DatasetMetadata {
        dataset_name: "heptapod/titanic".to_string(),
        title: "Titanic".to_string(),
        subtitle: "Survival of passengers".to_string(),
        description: "Predict who survived the sinking.".to_string(),
        datasets: vec![
            "./datasets/heptapod/titanic/train.csv".to_string(),
            "./datasets/heptapod/titanic/test.csv".to_string(),
        ],
    }
}

pub fn datasets() -> Arc<StaticDatasets> {
    Arc::new(StaticDatasets(Some(titanic())))
}
