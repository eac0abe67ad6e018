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
use crate::interpreter::NotebookPayload;
use crate::outcome::OperationResult;
use crate::services::NotebookActions;
use crate::stage::{NotebookAction, StageTag};
use crate::state::RunState;
use tracing::{debug, info};

/// Decides the notebook action from the created flag. The flag, the
/// stage's declared action and the payload shape must all agree.
pub fn resolve_action(
    stage: StageTag,
    created: bool,
    payload: &NotebookPayload,
) -> AgentResult<NotebookAction> {
    let action = if created {
        NotebookAction::Update
    } else {
        NotebookAction::Create
    };

    if stage.action() != action {
        return Err(AgentError::InvalidStageAction {
            stage,
            reason: format!(
                "stage {stage} performs {:?} but the notebook is {}",
                stage.action(),
                if created { "already created" } else { "not created yet" }
            ),
        });
    }

    let shape_matches = matches!(
        (action, payload),
        (NotebookAction::Create, NotebookPayload::Create(_))
            | (NotebookAction::Update, NotebookPayload::Update(_))
    );
    if !shape_matches {
        return Err(AgentError::InvalidStageAction {
            stage,
            reason: format!("{action:?} requires {}, got {}", stage.expected_shape(), payload.shape()),
        });
    }

    Ok(action)
}

pub struct ActionDispatcher<'a> {
    actions: &'a dyn NotebookActions,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(actions: &'a dyn NotebookActions) -> Self {
        Self { actions }
    }

    pub async fn dispatch(
        &self,
        run: &mut RunState,
        stage: StageTag,
        payload: &NotebookPayload,
    ) -> AgentResult<OperationResult> {
        let action = resolve_action(stage, run.is_created(), payload)?;
        debug!(stage = %stage, action = ?action, target_name = %run.target_name(), "Dispatching payload");

        let result = match payload {
            NotebookPayload::Create(content) => {
                self.actions.create(run.target_name(), content).await
            }
            NotebookPayload::Update(cells) => self.actions.update(run.target_name(), cells).await,
        };

        if action == NotebookAction::Create && result.is_success() {
            run.mark_created();
            info!(target_name = %run.target_name(), "Notebook created");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Outcome;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingActions {
        outcome: Option<Outcome>,
        calls: Mutex<Vec<NotebookAction>>,
    }

    impl RecordingActions {
        fn result(&self) -> OperationResult {
            match self.outcome.unwrap_or(Outcome::Success) {
                Outcome::Success => OperationResult::success(),
                Outcome::Failure => OperationResult::failure("failed", "cell error"),
                Outcome::Unknown => OperationResult::unknown("no response", ""),
            }
        }
    }

    #[async_trait]
    impl NotebookActions for RecordingActions {
        async fn create(&self, _target: &str, _content: &Map<String, Value>) -> OperationResult {
            self.calls.lock().unwrap().push(NotebookAction::Create);
            self.result()
        }

        async fn update(&self, _target: &str, _cells: &[Value]) -> OperationResult {
            self.calls.lock().unwrap().push(NotebookAction::Update);
            self.result()
        }
    }

    fn create_payload() -> NotebookPayload {
        let mut content = Map::new();
        content.insert("notebook_content".into(), json!({"cells": []}));
        NotebookPayload::Create(content)
    }

    fn update_payload() -> NotebookPayload {
        NotebookPayload::Update(vec![json!({"cell_type": "code", "source": []})])
    }

    #[test]
    fn test_resolve_action_table() {
        assert_eq!(
            resolve_action(StageTag::CreatingContent, false, &create_payload()).unwrap(),
            NotebookAction::Create
        );
        assert_eq!(
            resolve_action(StageTag::Training, true, &update_payload()).unwrap(),
            NotebookAction::Update
        );

        for (stage, created, payload) in [
            (StageTag::CreatingContent, true, create_payload()),
            (StageTag::Preprocessing, false, update_payload()),
            (StageTag::CreatingContent, false, update_payload()),
            (StageTag::Evaluating, true, create_payload()),
        ] {
            let err = resolve_action(stage, created, &payload).unwrap_err();
            assert!(matches!(err, AgentError::InvalidStageAction { .. }), "{stage} {created}");
        }
    }

    #[tokio::test]
    async fn test_successful_create_sets_flag() {
        let actions = RecordingActions::default();
        let dispatcher = ActionDispatcher::new(&actions);
        let mut run = RunState::new("titanic");

        let result = dispatcher
            .dispatch(&mut run, StageTag::CreatingContent, &create_payload())
            .await
            .unwrap();
        assert!(result.is_success());
        assert!(run.is_created());

        let err = dispatcher
            .dispatch(&mut run, StageTag::CreatingContent, &create_payload())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidStageAction { .. }));
        assert_eq!(*actions.calls.lock().unwrap(), vec![NotebookAction::Create]);
    }

    #[tokio::test]
    async fn test_failed_create_keeps_flag_clear() {
        let actions = RecordingActions {
            outcome: Some(Outcome::Failure),
            ..Default::default()
        };
        let dispatcher = ActionDispatcher::new(&actions);
        let mut run = RunState::new("titanic");

        let result = dispatcher
            .dispatch(&mut run, StageTag::CreatingContent, &create_payload())
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Failure);
        assert!(!run.is_created());
    }

    #[tokio::test]
    async fn test_update_before_create_is_rejected() {
        let actions = RecordingActions::default();
        let dispatcher = ActionDispatcher::new(&actions);
        let mut run = RunState::new("titanic");

        let err = dispatcher
            .dispatch(&mut run, StageTag::Preprocessing, &update_payload())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidStageAction { stage: StageTag::Preprocessing, .. }));
        assert!(actions.calls.lock().unwrap().is_empty());
    }
}
