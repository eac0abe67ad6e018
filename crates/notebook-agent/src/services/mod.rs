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

//! Collaborators the pipeline talks to: the dataset catalogue and the
//! notebook service that creates, updates and executes notebooks.

pub mod http;

use crate::error::AgentResult;
use crate::outcome::OperationResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use http::HttpNotebookService;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(default)]
    pub dataset_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub datasets: Vec<String>,
}

impl DatasetMetadata {
    /// File list as rendered into prompts.
    pub fn dataset_files(&self) -> String {
        self.datasets.join(",")
    }
}

#[async_trait]
pub trait DatasetLookup: Send + Sync {
    async fn lookup(&self, search_term: &str) -> AgentResult<DatasetMetadata>;
}

/// Notebook operations. Implementations never fail with an error; a
/// missing or unreadable response is reported as an `Unknown` result.
#[async_trait]
pub trait NotebookActions: Send + Sync {
    async fn create(&self, target_name: &str, content: &Map<String, Value>) -> OperationResult;

    async fn update(&self, target_name: &str, cells: &[Value]) -> OperationResult;
}
