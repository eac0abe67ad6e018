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

use crate::memory::MemoryStore;
use uuid::Uuid;

/// Mutable context of one pipeline invocation.
///
/// A fresh value is built for every run and lent by `&mut` to each
/// component, so concurrent runs never observe each other's memory,
/// attempt counter or created flag.
#[derive(Debug, Clone)]
pub struct RunState {
    run_id: Uuid,
    target_name: String,
    pub memory: MemoryStore,
    attempts: u32,
    created: bool,
}

impl RunState {
    pub fn new(target_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            target_name: target_name.into(),
            memory: MemoryStore::new(),
            attempts: 0,
            created: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn mark_created(&mut self) {
        self.created = true;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn increment_attempts(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }
}
