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

use super::{DatasetLookup, DatasetMetadata, NotebookActions};
use crate::error::{AgentError, AgentResult};
use crate::outcome::{OperationResult, Outcome};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const STATUS_SUCCESS: &str = "success";

/// Response body of the notebook endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl From<StatusResponse> for OperationResult {
    fn from(response: StatusResponse) -> Self {
        let outcome = if response.status == STATUS_SUCCESS {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        OperationResult {
            outcome,
            message: response.message,
            details: response.details,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpNotebookService {
    client: Client,
    base_url: Url,
}

impl HttpNotebookService {
    pub fn new(base_url: &str, timeout_seconds: u64) -> AgentResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AgentError::Configuration(format!("Invalid service URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AgentError::Configuration(format!(
                "Service URL '{base_url}' cannot be used as a base"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AgentError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post_status<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> OperationResult {
        debug!(url = %url, "Posting to notebook service");

        let response = match self.client.post(url.clone()).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Notebook service request failed");
                return OperationResult::unknown(
                    "No response from notebook service",
                    e.to_string(),
                );
            }
        };

        let status = response.status();
        info!(url = %url, status = %status, "Received response from notebook service");

        match decode::<StatusResponse>(response).await {
            Ok(body) => body.into(),
            Err(details) => OperationResult::unknown(
                format!("Unreadable response from notebook service ({status})"),
                details,
            ),
        }
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, String> {
    let text = response
        .text()
        .await
        .map_err(|e| format!("Failed to read response body: {e}"))?;
    serde_json::from_str(&text).map_err(|e| format!("Failed to parse response body: {e}: {text}"))
}

#[async_trait]
impl DatasetLookup for HttpNotebookService {
    async fn lookup(&self, search_term: &str) -> AgentResult<DatasetMetadata> {
        let url = self.endpoint(&["dataset", "download", search_term]);
        debug!(url = %url, "Looking up dataset");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AgentError::DatasetLookup(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::DatasetLookup(format!(
                "Dataset service returned {status} for '{search_term}': {body}"
            )));
        }

        let metadata: DatasetMetadata = decode(response).await.map_err(AgentError::DatasetLookup)?;
        info!(
            dataset = %metadata.dataset_name,
            files = metadata.datasets.len(),
            "Dataset metadata retrieved"
        );
        Ok(metadata)
    }
}

#[async_trait]
impl NotebookActions for HttpNotebookService {
    async fn create(&self, target_name: &str, content: &Map<String, Value>) -> OperationResult {
        let url = self.endpoint(&["notebook", "create", target_name]);
        self.post_status(url, content).await
    }

    async fn update(&self, target_name: &str, cells: &[Value]) -> OperationResult {
        let url = self.endpoint(&["notebook", "update", target_name]);
        self.post_status(url, cells).await
    }
}
