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

use crate::outcome::{OperationResult, Outcome};
use crate::stage::StageTag;
use llm_contracts::LLMError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyGeneration,
    MalformedGeneration,
    InvalidStageAction,
    DownstreamFailure,
    DownstreamUnknown,
    RetryExhausted,
    EmptyMemory,
    DatasetLookup,
    Configuration,
}

#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("Empty response from generation backend during stage {stage}")]
    EmptyGeneration { stage: StageTag },

    #[error("Malformed generation during stage {stage}: {reason}")]
    MalformedGeneration {
        stage: StageTag,
        reason: String,
        raw: String,
    },

    #[error("Invalid notebook action during stage {stage}: {reason}")]
    InvalidStageAction { stage: StageTag, reason: String },

    #[error("Notebook service reported a failure: {message}")]
    DownstreamFailure { message: String, details: String },

    #[error("Notebook service returned no result: {message}")]
    DownstreamUnknown { message: String, details: String },

    #[error("Generation backend failed: {0}")]
    Generation(#[from] LLMError),

    #[error("Stage {stage} failed after {attempts} repair attempts")]
    RetryExhausted {
        stage: StageTag,
        attempts: u32,
        last_output: String,
        details: String,
    },

    #[error("No generation round has been recorded for this run")]
    EmptyMemory,

    #[error("Dataset lookup failed: {0}")]
    DatasetLookup(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AgentError {
    /// Builds the error for a non-successful downstream result.
    pub fn from_result(result: &OperationResult) -> Option<Self> {
        let message = result.message_or_default().to_string();
        let details = result.details_or_default().to_string();
        match result.outcome {
            Outcome::Success => None,
            Outcome::Failure => Some(AgentError::DownstreamFailure { message, details }),
            Outcome::Unknown => Some(AgentError::DownstreamUnknown { message, details }),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AgentError::EmptyGeneration { .. } => FailureKind::EmptyGeneration,
            AgentError::MalformedGeneration { .. } => FailureKind::MalformedGeneration,
            AgentError::InvalidStageAction { .. } => FailureKind::InvalidStageAction,
            AgentError::DownstreamFailure { .. } => FailureKind::DownstreamFailure,
            AgentError::DownstreamUnknown { .. } | AgentError::Generation(_) => {
                FailureKind::DownstreamUnknown
            }
            AgentError::RetryExhausted { .. } => FailureKind::RetryExhausted,
            AgentError::EmptyMemory => FailureKind::EmptyMemory,
            AgentError::DatasetLookup(_) => FailureKind::DatasetLookup,
            AgentError::Template(_) | AgentError::Configuration(_) => FailureKind::Configuration,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::EmptyGeneration { .. }
                | AgentError::MalformedGeneration { .. }
                | AgentError::DownstreamFailure { .. }
                | AgentError::DownstreamUnknown { .. }
                | AgentError::Generation(_)
        )
    }

    /// Short human-readable summary, used as the error message of a
    /// remediation prompt and of the final pipeline result.
    pub fn message(&self) -> String {
        match self {
            AgentError::EmptyGeneration { .. } => "Empty response from LLM".to_string(),
            AgentError::MalformedGeneration { .. } => {
                "Response from LLM could not be read as notebook content".to_string()
            }
            AgentError::DownstreamFailure { message, .. }
            | AgentError::DownstreamUnknown { message, .. } => message.clone(),
            AgentError::Generation(_) => "Generation backend did not return a result".to_string(),
            AgentError::RetryExhausted { last_output, .. } => {
                format!("Agent Output: {last_output}")
            }
            other => other.to_string(),
        }
    }

    pub fn details(&self) -> String {
        match self {
            AgentError::EmptyGeneration { stage } => {
                format!("The generation backend returned blank text for stage {stage}")
            }
            AgentError::MalformedGeneration { reason, raw, .. } => {
                format!("{reason}\nRaw output:\n{raw}")
            }
            AgentError::InvalidStageAction { reason, .. } => reason.clone(),
            AgentError::DownstreamFailure { details, .. }
            | AgentError::DownstreamUnknown { details, .. }
            | AgentError::RetryExhausted { details, .. } => details.clone(),
            AgentError::Generation(err) => err.to_string(),
            other => other.to_string(),
        }
    }

    pub fn to_operation_result(&self) -> OperationResult {
        OperationResult::failure(self.message(), self.details())
    }
}
