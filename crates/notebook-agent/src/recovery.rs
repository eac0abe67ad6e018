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
use crate::executor::{RoundExecutor, RoundVerdict};
use crate::logging::log_retry;
use crate::outcome::OperationResult;
use crate::prompts::{context_builders, names, PromptBuilder};
use crate::stage::StageTag;
use crate::state::RunState;
use tracing::error;

/// Bounded repair loop for a stage whose round did not succeed.
///
/// Each repair asks the backend to correct the last recorded round, given
/// the failure that ended it. The run's attempt counter is shared with the
/// orchestrator, which resets it when a stage starts; once it reaches
/// `max_repair_attempts` the next failure ends the stage with
/// [`AgentError::RetryExhausted`] and the backend is not called again.
pub struct RecoveryLoop<'a> {
    executor: &'a RoundExecutor<'a>,
    prompts: &'a PromptBuilder,
    max_repair_attempts: u32,
}

impl<'a> RecoveryLoop<'a> {
    pub fn new(
        executor: &'a RoundExecutor<'a>,
        prompts: &'a PromptBuilder,
        max_repair_attempts: u32,
    ) -> Self {
        Self {
            executor,
            prompts,
            max_repair_attempts,
        }
    }

    pub async fn recover(
        &self,
        run: &mut RunState,
        stage: StageTag,
        failure: AgentError,
    ) -> AgentResult<OperationResult> {
        let mut failure = failure;

        loop {
            if run.attempts() >= self.max_repair_attempts {
                run.memory.last_entry()?;
                let last_output = run.memory.last_output().to_string();
                error!(
                    stage = %stage,
                    attempts = run.attempts(),
                    error = %failure,
                    "Repair attempts exhausted"
                );
                return Err(AgentError::RetryExhausted {
                    stage,
                    attempts: run.attempts(),
                    last_output,
                    details: failure.details(),
                });
            }

            let attempt = run.increment_attempts();
            log_retry(stage, attempt, self.max_repair_attempts, &failure);

            let context = context_builders::remediation_context(run.memory.last_entry()?, &failure);
            let prompt = self.prompts.build_prompt(names::REMEDIATION, &context)?;

            match RoundVerdict::from(self.executor.execute_round(run, stage, &prompt).await) {
                RoundVerdict::Done(result) => return Ok(result),
                RoundVerdict::Retry(next) => failure = next,
                RoundVerdict::Fatal(err) => return Err(err),
            }
        }
    }
}
