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

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use llm_contracts::GenerationBackend;
use notebook_agent::{
    AgentConfig, HttpGenerationBackend, HttpNotebookService, PipelineOrchestrator, PromptBuilder,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "notebook-pipeline",
    about = "Generate, test and repair a data-science notebook stage by stage"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run every stage for one notebook and print the report as JSON.
    Run {
        /// Notebook name on the notebook service.
        #[arg(long)]
        target: String,

        /// Dataset search term.
        #[arg(long)]
        search: String,

        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Overrides `pipeline.max_repair_attempts`.
        #[arg(long, value_name = "N")]
        max_repairs: Option<u32>,
    },

    /// List the prompt templates.
    Templates,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run {
            target,
            search,
            config,
            max_repairs,
        } => run(target, search, config, max_repairs).await,
        Command::Templates => {
            list_templates();
            Ok(())
        }
    }
}

async fn run(
    target: String,
    search: String,
    config_path: Option<PathBuf>,
    max_repairs: Option<u32>,
) -> Result<()> {
    let mut config = AgentConfig::load_with_env(config_path.as_deref())
        .context("failed to load configuration")?;
    if max_repairs.is_some() {
        config.pipeline.max_repair_attempts = max_repairs;
    }
    let settings = config.pipeline_settings()?;

    let backend = HttpGenerationBackend::from_config(&config.llm)?;
    let service = Arc::new(HttpNotebookService::new(
        &config.service.base_url,
        config.service.timeout_seconds,
    )?);
    info!(
        backend = backend.name(),
        service = %service.base_url(),
        max_repair_attempts = settings.max_repair_attempts,
        "notebook-pipeline starting"
    );

    let orchestrator =
        PipelineOrchestrator::new(Arc::new(backend), service.clone(), service, settings);
    let report = orchestrator.run_pipeline(&target, &search).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_success() {
        anyhow::bail!(
            "pipeline failed for '{target}': {}",
            report.result.message_or_default()
        );
    }
    Ok(())
}

fn list_templates() {
    let prompts = PromptBuilder::with_notebook_templates();
    for template in prompts.list_templates() {
        println!(
            "{:<14} {} [{}]",
            template.name,
            template.description,
            template.variables.join(", ")
        );
    }
}
