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

use crate::error::AgentError;
use crate::stage::StageTag;
use serde_json::Value;
use tracing::{debug, error, info, warn};

pub mod events {
    pub const RUN_STARTED: &str = "run_started";
    pub const STAGE_STARTED: &str = "stage_started";
    pub const STAGE_COMPLETED: &str = "stage_completed";
    pub const RUN_SUCCEEDED: &str = "run_succeeded";
    pub const RUN_FAILED: &str = "run_failed";
}

pub fn log_stage_event(event: &str, target: &str, stage: Option<StageTag>, payload: Value) {
    info!(
        event = event,
        target_name = target,
        stage = stage.map(StageTag::as_str).unwrap_or("-"),
        payload = %serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string()),
        "Pipeline event"
    );
}

pub fn log_round(stage: StageTag, attempt: u32, prompt_len: usize, output_len: usize) {
    debug!(
        stage = %stage,
        attempt = attempt,
        prompt_len = prompt_len,
        output_len = output_len,
        "Generation round"
    );
}

pub fn log_retry(stage: StageTag, attempt: u32, max_attempts: u32, failure: &AgentError) {
    warn!(
        stage = %stage,
        attempt = attempt,
        max_attempts = max_attempts,
        kind = ?failure.kind(),
        error = %failure,
        "Retrying stage after recoverable failure"
    );
}

pub fn log_error(context: &str, error: &dyn std::error::Error) {
    error!(
        context = context,
        error = %error,
        "Pipeline error"
    );
}
