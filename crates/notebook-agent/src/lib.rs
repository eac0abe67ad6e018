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

//! Staged generation pipeline for data-science notebooks.
//!
//! A run looks up dataset metadata, then walks the notebook through the
//! creating, preprocessing, training and evaluating stages. Each stage asks
//! a generation backend for notebook content, interprets the answer and
//! hands it to the notebook service, repairing failed rounds within a
//! configured budget.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod interpreter;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod orchestrator;
pub mod outcome;
pub mod prompts;
pub mod recovery;
pub mod services;
pub mod stage;
pub mod state;

pub use config::AgentConfig;
pub use error::{AgentError, AgentResult, FailureKind};
pub use interpreter::{NotebookPayload, PayloadInterpreter};
pub use llm::HttpGenerationBackend;
pub use memory::{MemoryEntry, MemoryStore};
pub use orchestrator::{PipelineOrchestrator, PipelineReport, PipelineSettings, PipelineStatus};
pub use outcome::{OperationResult, Outcome};
pub use prompts::{InitialTemplate, PromptBuilder};
pub use services::{DatasetLookup, DatasetMetadata, HttpNotebookService, NotebookActions};
pub use stage::StageTag;
pub use state::RunState;
