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
use crate::stage::StageTag;
use serde::Serialize;
use tracing::debug;

/// One generation round: the prompt that was sent and the raw text that came
/// back. Entries are never modified after they are appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    state: StageTag,
    user_input: String,
    agent_output: String,
}

impl MemoryEntry {
    pub fn state(&self) -> StageTag {
        self.state
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn agent_output(&self) -> &str {
        &self.agent_output
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextItem<'a> {
    user_input: &'a str,
    agent_output: &'a str,
}

/// Append-only log of the generation rounds of a single pipeline run.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Vec<MemoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        state: StageTag,
        user_input: impl Into<String>,
        agent_output: impl Into<String>,
    ) {
        debug!(stage = %state, entries = self.entries.len() + 1, "Updating agent memory");
        self.entries.push(MemoryEntry {
            state,
            user_input: user_input.into(),
            agent_output: agent_output.into(),
        });
    }

    pub fn last_entry(&self) -> AgentResult<&MemoryEntry> {
        self.entries.last().ok_or(AgentError::EmptyMemory)
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    /// Most recent non-empty agent output, or `""` when no round produced any.
    pub fn last_output(&self) -> &str {
        self.entries
            .iter()
            .rev()
            .map(|entry| entry.agent_output.as_str())
            .find(|output| !output.is_empty())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialises every round, oldest first, as a JSON array of
    /// `{"userInput", "agentOutput"}` objects for embedding in a prompt.
    pub fn render_context(&self) -> String {
        let items: Vec<ContextItem<'_>> = self
            .entries
            .iter()
            .map(|entry| ContextItem {
                user_input: &entry.user_input,
                agent_output: &entry.agent_output,
            })
            .collect();

        serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_last_entry_on_empty_memory() {
        let memory = MemoryStore::new();
        assert!(matches!(memory.last_entry(), Err(AgentError::EmptyMemory)));
        assert_eq!(memory.render_context(), "[]");
    }

    #[test]
    fn test_append_keeps_order() {
        let mut memory = MemoryStore::new();
        memory.append(StageTag::CreatingContent, "load titanic", "{}");
        memory.append(StageTag::Preprocessing, "clean it", "[]");
        memory.append(StageTag::Preprocessing, "clean it", "[]");

        assert_eq!(memory.len(), 3);
        assert_eq!(memory.last_entry().unwrap().state(), StageTag::Preprocessing);
        assert_eq!(memory.entries()[0].user_input(), "load titanic");
    }

    #[test]
    fn test_last_output_skips_empty_rounds() {
        let mut memory = MemoryStore::new();
        assert_eq!(memory.last_output(), "");

        memory.append(StageTag::Training, "train", "[{\"cell_type\": \"code\"}]");
        memory.append(StageTag::Training, "repair", "");
        assert_eq!(memory.last_entry().unwrap().agent_output(), "");
        assert_eq!(memory.last_output(), "[{\"cell_type\": \"code\"}]");
    }

    #[test]
    fn test_render_context_escapes_generated_text() {
        let mut memory = MemoryStore::new();
        let prompt = "Title: \"Titanic\"\nFiles: C:\\data\\train.csv";
        let output = "{\"cells\": [{\"source\": [\"print(\\\"hi\\\")\\n\"]}]}\r\n";
        memory.append(StageTag::CreatingContent, prompt, output);
        memory.append(StageTag::Preprocessing, "tab\there", "line one\nline two");

        let rendered = memory.render_context();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        let items = parsed.as_array().unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["userInput"], prompt);
        assert_eq!(items[0]["agentOutput"], output);
        assert_eq!(items[1]["userInput"], "tab\there");
        assert_eq!(items[1]["agentOutput"], "line one\nline two");
    }
}
