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

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    /// The downstream call produced no result at all.
    Unknown,
}

/// Result of one generation and dispatch round, or of a whole pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl OperationResult {
    pub fn success() -> Self {
        Self {
            outcome: Outcome::Success,
            message: None,
            details: None,
        }
    }

    pub fn failure(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failure,
            message: Some(message.into()),
            details: Some(details.into()),
        }
    }

    pub fn unknown(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Unknown,
            message: Some(message.into()),
            details: Some(details.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn message_or_default(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or("Unknown error")
    }

    pub fn details_or_default(&self) -> &str {
        self.details.as_deref().unwrap_or("")
    }
}
