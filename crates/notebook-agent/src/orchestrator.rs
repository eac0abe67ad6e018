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

use crate::error::{AgentError, AgentResult, FailureKind};
use crate::executor::{RoundExecutor, RoundVerdict};
use crate::logging::{events, log_error, log_stage_event};
use crate::outcome::OperationResult;
use crate::prompts::{context_builders, InitialTemplate, PromptBuilder, PromptContext};
use crate::recovery::RecoveryLoop;
use crate::services::{DatasetLookup, DatasetMetadata, NotebookActions};
use crate::stage::StageTag;
use crate::state::RunState;
use llm_contracts::{GenerationBackend, GenerationConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_repair_attempts: u32,
    pub initial_template: InitialTemplate,
    pub generation: GenerationConfig,
}

impl PipelineSettings {
    pub fn new(max_repair_attempts: u32) -> Self {
        Self {
            max_repair_attempts,
            initial_template: InitialTemplate::default(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn with_initial_template(mut self, initial_template: InitialTemplate) -> Self {
        self.initial_template = initial_template;
        self
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub status: PipelineStatus,
    pub target_name: String,
    pub result: OperationResult,
    pub completed_stages: Vec<StageTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<StageTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    pub rounds_recorded: usize,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Succeeded
    }
}

/// Drives a notebook through every stage in order.
///
/// The orchestrator holds no per-run state: each call to
/// [`run_pipeline`](Self::run_pipeline) builds its own [`RunState`], so one
/// instance can serve concurrent runs from behind an `Arc`.
pub struct PipelineOrchestrator {
    backend: Arc<dyn GenerationBackend>,
    datasets: Arc<dyn DatasetLookup>,
    actions: Arc<dyn NotebookActions>,
    prompts: PromptBuilder,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        datasets: Arc<dyn DatasetLookup>,
        actions: Arc<dyn NotebookActions>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            backend,
            datasets,
            actions,
            prompts: PromptBuilder::with_notebook_templates(),
            settings,
        }
    }

    pub async fn run_pipeline(&self, target_name: &str, search_term: &str) -> PipelineReport {
        let mut run = RunState::new(target_name);
        let mut completed = Vec::new();

        log_stage_event(
            events::RUN_STARTED,
            target_name,
            None,
            json!({
                "run_id": run.run_id().to_string(),
                "search_term": search_term,
                "backend": self.backend.name(),
                "max_repair_attempts": self.settings.max_repair_attempts,
            }),
        );

        let metadata = match self.datasets.lookup(search_term).await {
            Ok(metadata) => metadata,
            Err(err) => return self.failed(&run, completed, None, err),
        };

        for &stage in StageTag::pipeline() {
            match self.run_stage(&mut run, stage, &metadata).await {
                Ok(_) => completed.push(stage),
                Err(err) => return self.failed(&run, completed, Some(stage), err),
            }
        }

        log_stage_event(
            events::RUN_SUCCEEDED,
            target_name,
            None,
            json!({ "rounds": run.memory.len() }),
        );
        PipelineReport {
            status: PipelineStatus::Succeeded,
            target_name: target_name.to_string(),
            result: OperationResult::success()
                .with_message(format!("Notebook '{target_name}' passed every stage")),
            completed_stages: completed,
            failed_stage: None,
            failure_kind: None,
            rounds_recorded: run.memory.len(),
        }
    }

    async fn run_stage(
        &self,
        run: &mut RunState,
        stage: StageTag,
        metadata: &DatasetMetadata,
    ) -> AgentResult<OperationResult> {
        run.reset_attempts();
        log_stage_event(events::STAGE_STARTED, run.target_name(), Some(stage), json!({}));

        let template = PromptBuilder::template_for(stage, self.settings.initial_template);
        let context = self.stage_context(run, stage, metadata);
        self.prompts.validate_context(template, &context)?;
        let prompt = self.prompts.build_prompt(template, &context)?;

        let executor = RoundExecutor::new(
            self.backend.as_ref(),
            self.actions.as_ref(),
            self.settings.generation.clone(),
        );

        let result = match RoundVerdict::from(executor.execute_round(run, stage, &prompt).await) {
            RoundVerdict::Done(result) => result,
            RoundVerdict::Fatal(err) => return Err(err),
            RoundVerdict::Retry(failure) => {
                RecoveryLoop::new(&executor, &self.prompts, self.settings.max_repair_attempts)
                    .recover(run, stage, failure)
                    .await?
            }
        };

        log_stage_event(
            events::STAGE_COMPLETED,
            run.target_name(),
            Some(stage),
            json!({ "repairs": run.attempts() }),
        );
        Ok(result)
    }

    fn stage_context(
        &self,
        run: &RunState,
        stage: StageTag,
        metadata: &DatasetMetadata,
    ) -> PromptContext {
        match stage {
            StageTag::CreatingContent => context_builders::dataset_context(metadata),
            _ => context_builders::memory_context(&run.memory),
        }
    }

    fn failed(
        &self,
        run: &RunState,
        completed: Vec<StageTag>,
        stage: Option<StageTag>,
        err: AgentError,
    ) -> PipelineReport {
        log_error(run.target_name(), &err);
        log_stage_event(
            events::RUN_FAILED,
            run.target_name(),
            stage,
            json!({ "kind": err.kind(), "rounds": run.memory.len() }),
        );

        PipelineReport {
            status: PipelineStatus::Failed,
            target_name: run.target_name().to_string(),
            result: err.to_operation_result(),
            completed_stages: completed,
            failed_stage: stage,
            failure_kind: Some(err.kind()),
            rounds_recorded: run.memory.len(),
        }
    }
}
