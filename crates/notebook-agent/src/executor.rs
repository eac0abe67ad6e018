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

use crate::dispatcher::ActionDispatcher;
use crate::error::{AgentError, AgentResult};
use crate::interpreter::PayloadInterpreter;
use crate::logging::log_round;
use crate::outcome::OperationResult;
use crate::prompts::RenderedPrompt;
use crate::services::NotebookActions;
use crate::stage::StageTag;
use crate::state::RunState;
use llm_contracts::{GenerationBackend, GenerationConfig, LLMRequest, RequestContext};

/// How a round ended, from the point of view of the stage loop.
#[derive(Debug, Clone)]
pub enum RoundVerdict {
    Done(OperationResult),
    Retry(AgentError),
    Fatal(AgentError),
}

impl From<AgentResult<OperationResult>> for RoundVerdict {
    fn from(result: AgentResult<OperationResult>) -> Self {
        match result {
            Ok(result) => match AgentError::from_result(&result) {
                None => RoundVerdict::Done(result),
                Some(failure) => RoundVerdict::Retry(failure),
            },
            Err(err) if err.is_retryable() => RoundVerdict::Retry(err),
            Err(err) => RoundVerdict::Fatal(err),
        }
    }
}

/// One generate, interpret and dispatch round.
pub struct RoundExecutor<'a> {
    backend: &'a dyn GenerationBackend,
    dispatcher: ActionDispatcher<'a>,
    interpreter: PayloadInterpreter,
    generation: GenerationConfig,
}

impl<'a> RoundExecutor<'a> {
    pub fn new(
        backend: &'a dyn GenerationBackend,
        actions: &'a dyn NotebookActions,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            backend,
            dispatcher: ActionDispatcher::new(actions),
            interpreter: PayloadInterpreter::new(),
            generation,
        }
    }

    /// Runs a round. The round is recorded in memory whatever the backend
    /// returns; a backend error is recorded with an empty output.
    pub async fn execute_round(
        &self,
        run: &mut RunState,
        stage: StageTag,
        prompt: &RenderedPrompt,
    ) -> AgentResult<OperationResult> {
        let request = LLMRequest::new(prompt.user.clone())
            .with_system_prompt(prompt.system.clone())
            .with_generation_config(self.generation.clone())
            .with_context(RequestContext {
                run_id: Some(run.run_id()),
                stage: Some(stage.as_str().to_string()),
            });

        let raw = match self.backend.generate(request).await {
            Ok(response) => response.content,
            Err(e) => {
                run.memory.append(stage, prompt.user.as_str(), "");
                return Err(AgentError::Generation(e));
            }
        };
        log_round(stage, run.attempts(), prompt.user.len(), raw.len());

        let payload =
            self.interpreter
                .record_and_interpret(&mut run.memory, stage, &prompt.user, &raw)?;
        self.dispatcher.dispatch(run, stage, &payload).await
    }
}
