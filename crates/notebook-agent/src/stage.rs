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
use std::fmt;

/// Fixed pipeline order. Stages are visited front to back, never skipped.
const PIPELINE: [StageTag; 4] = [
    StageTag::CreatingContent,
    StageTag::Preprocessing,
    StageTag::Training,
    StageTag::Evaluating,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageTag {
    CreatingContent,
    Preprocessing,
    Training,
    Evaluating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotebookAction {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    Object,
    CellList,
}

impl StageTag {
    pub fn pipeline() -> &'static [StageTag] {
        &PIPELINE
    }

    pub fn action(self) -> NotebookAction {
        match self {
            StageTag::CreatingContent => NotebookAction::Create,
            StageTag::Preprocessing | StageTag::Training | StageTag::Evaluating => {
                NotebookAction::Update
            }
        }
    }

    pub fn expected_shape(self) -> PayloadShape {
        match self.action() {
            NotebookAction::Create => PayloadShape::Object,
            NotebookAction::Update => PayloadShape::CellList,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageTag::CreatingContent => "creating_content",
            StageTag::Preprocessing => "preprocessing",
            StageTag::Training => "training",
            StageTag::Evaluating => "evaluating",
        }
    }
}

impl fmt::Display for StageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadShape::Object => f.write_str("a JSON object"),
            PayloadShape::CellList => f.write_str("a JSON array of notebook cells"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order() {
        let stages = StageTag::pipeline();
        assert_eq!(stages.first(), Some(&StageTag::CreatingContent));
        assert_eq!(stages.last(), Some(&StageTag::Evaluating));
        assert_eq!(stages.len(), 4);
    }

    #[test]
    fn test_only_first_stage_creates() {
        let creators: Vec<_> = StageTag::pipeline()
            .iter()
            .filter(|stage| stage.action() == NotebookAction::Create)
            .collect();
        assert_eq!(creators, vec![&StageTag::CreatingContent]);
        assert_eq!(StageTag::Training.expected_shape(), PayloadShape::CellList);
    }
}
