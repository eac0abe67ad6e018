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

use crate::requests::LLMRequest;
use crate::responses::LLMResponse;
use crate::types::LLMResult;
use async_trait::async_trait;

/// An opaque prompt-to-text service.
///
/// Implementations own their transport and timeouts; a timed out call is
/// reported as [`crate::LLMError::Timeout`].
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: LLMRequest) -> LLMResult<LLMResponse>;

    fn name(&self) -> &str;

    async fn generate_text(&self, prompt: &str) -> LLMResult<String> {
        let response = self.generate(LLMRequest::new(prompt)).await?;
        Ok(response.content)
    }
}
