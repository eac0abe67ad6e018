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
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

pub mod names {
    pub const DATA_LOADING: &str = "data_loading";
    pub const FULL_NOTEBOOK: &str = "full_notebook";
    pub const PREPROCESSING: &str = "preprocessing";
    pub const TRAINING: &str = "training";
    pub const EVALUATING: &str = "evaluating";
    pub const REMEDIATION: &str = "remediation";
}

/// Which template seeds the notebook in the create stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialTemplate {
    #[default]
    DataLoading,
    FullNotebook,
}

impl InitialTemplate {
    pub fn template_name(self) -> &'static str {
        match self {
            InitialTemplate::DataLoading => names::DATA_LOADING,
            InitialTemplate::FullNotebook => names::FULL_NOTEBOOK,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub description: String,
    pub system_template: String,
    pub user_template: String,

    pub variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(
        name: impl Into<String>,
        system_template: impl Into<String>,
        user_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_template: system_template.into(),
            user_template: user_template.into(),
            variables: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_variables(mut self, variables: &[&str]) -> Self {
        self.variables = variables.iter().map(|v| v.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

pub type PromptContext = HashMap<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notebook_templates() -> Self {
        let mut builder = Self::new();
        builder.add_notebook_templates();
        builder
    }

    pub fn add_template(&mut self, template: PromptTemplate) -> &mut Self {
        self.templates.insert(template.name.clone(), template);
        self
    }

    /// Name of the template that produces content for `stage`.
    pub fn template_for(stage: StageTag, initial: InitialTemplate) -> &'static str {
        match stage {
            StageTag::CreatingContent => initial.template_name(),
            StageTag::Preprocessing => names::PREPROCESSING,
            StageTag::Training => names::TRAINING,
            StageTag::Evaluating => names::EVALUATING,
        }
    }

    pub fn build_prompt(
        &self,
        template_name: &str,
        context: &PromptContext,
    ) -> AgentResult<RenderedPrompt> {
        let template = self.get_template(template_name)?;

        let system =
            substitute_variables(&template.system_template, &template.variables, context);
        let user = substitute_variables(&template.user_template, &template.variables, context);

        debug!(
            "Built prompt from template '{}' with {} context variables",
            template_name,
            context.len()
        );
        Ok(RenderedPrompt { system, user })
    }

    pub fn list_templates(&self) -> Vec<&PromptTemplate> {
        let mut templates: Vec<_> = self.templates.values().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    pub fn get_template(&self, name: &str) -> AgentResult<&PromptTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| AgentError::Template(format!("Template '{name}' not found")))
    }

    pub fn validate_context(&self, template_name: &str, context: &PromptContext) -> AgentResult<()> {
        let template = self.get_template(template_name)?;

        let missing_vars: Vec<&String> = template
            .variables
            .iter()
            .filter(|var| !context.contains_key(*var))
            .collect();

        if !missing_vars.is_empty() {
            return Err(AgentError::Template(format!(
                "Missing required variables for template '{template_name}': {missing_vars:?}"
            )));
        }

        Ok(())
    }

    pub fn add_notebook_templates(&mut self) {
        self.add_template(PromptTemplate::new(
            names::DATA_LOADING,
            "You are a data scientist writing Jupyter notebooks. You answer with notebook JSON only.",
            r#"Create a Jupyter notebook that loads and inspects a dataset.

You are provided with the following dataset metadata:

Title: {{title}}
Subtitle: {{subtitle}}
Description: {{description}}
Dataset files: {{datasets}}

1. Load the training and testing datasets from the dataset files above. If there is only one file, treat it as the training set. Use the exact file names given.
2. Display the first few rows of the training set using head().
3. Show the training set info using info().
4. Provide a statistical summary of the training set using describe().
5. Print the training set shape and column names.
6. Identify the target variable (look for names such as 'target', 'label', 'class', 'y', or fall back to the last column).
7. Start the notebook with a markdown cell that introduces the dataset and the problem to solve.
8. Detect whether a GPU is available (PyTorch or TensorFlow) and configure the environment to use it, defaulting to CPU. Include the detected device in the dataset summary.

Requirements:
- Import every library you use (pandas, numpy, ...).
- Handle CSV, JSON and Excel files, with error handling around file loading.
- Print the dataset shape, column names and types, missing value counts per column, the suspected target variable and a sample of the data.
- Store the training set in a variable called `df` and the validation set, if any, in `test_df`.
- End with a cell that builds `dataset_summary = {"shape": ..., "columns": ..., "missing_values": ..., "sample_data": ..., "statistical_summary": ..., "info": ...}` and displays it.

Return ONLY the notebook as a valid ipynb JSON object (with "cells", "metadata", "nbformat" and "nbformat_minor"). Do not wrap it in markdown fences and do not add any other text."#,
        )
        .with_description("Creates the notebook with dataset loading and inspection cells")
        .with_variables(&["title", "subtitle", "description", "datasets"]));

        self.add_template(PromptTemplate::new(
            names::FULL_NOTEBOOK,
            "You are a data scientist writing Jupyter notebooks. You answer with notebook JSON only.",
            r#"Generate a complete Jupyter notebook that trains a machine learning model on the dataset described below.

Title: {{title}}
Subtitle: {{subtitle}}
Description: {{description}}
Dataset files: {{datasets}}

Include markdown cells that introduce the dataset and the problem, explain each code block before it runs, and summarise the results at the end.

Include code cells that:
- load the dataset files and inspect them (head(), info(), describe());
- preprocess the data (missing values, categorical encoding, scaling where needed);
- split the data into training and test sets;
- train a model suited to the task (regression, classification, clustering, ...);
- evaluate the model with relevant metrics.

The last code cell must print a JSON object:
{"accuracy": ..., "precision": ..., "recall": ..., "f1_score": ..., "model_used": "<model class name>"}

Use pandas, numpy, matplotlib/seaborn and scikit-learn, and comment the key steps.

Return ONLY the notebook as a valid ipynb JSON object. Do not wrap it in markdown fences and do not add any other text."#,
        )
        .with_description("Creates a complete train and evaluate notebook in one step")
        .with_variables(&["title", "subtitle", "description", "datasets"]));

        self.add_template(PromptTemplate::new(
            names::PREPROCESSING,
            "You are a data scientist extending an existing Jupyter notebook. You answer with a JSON array of notebook cells only.",
            r#"The notebook has already been created. These are the previous requests and the content you produced, oldest first:

{{memory}}

Write the data preprocessing cells for the training data in `df` (and `test_df` when it exists):
1. Handle missing values.
2. Encode categorical variables.
3. Scale or normalise numeric features where appropriate.
4. Separate the features from the target variable identified earlier into `X` and `y`.
5. Split into `X_train`, `X_val`, `y_train`, `y_val`.
Put a markdown cell before each code cell explaining what it does.

Return ONLY a JSON array of ipynb cells, for example:
[{"cell_type": "markdown", "metadata": {}, "source": ["..."]}, {"cell_type": "code", "execution_count": null, "metadata": {}, "outputs": [], "source": ["..."]}]
Do not wrap the array in markdown fences and do not add any other text."#,
        )
        .with_description("Appends preprocessing cells")
        .with_variables(&["memory"]));

        self.add_template(PromptTemplate::new(
            names::TRAINING,
            "You are a data scientist extending an existing Jupyter notebook. You answer with a JSON array of notebook cells only.",
            r#"The notebook already loads and preprocesses the data. These are the previous requests and the content you produced, oldest first:

{{memory}}

Write the model training cells:
1. Pick a model suited to the target variable (classification or regression) and explain the choice in a markdown cell.
2. Train it on `X_train` and `y_train`, using the GPU device detected earlier when the library supports it.
3. Store the trained estimator in a variable called `model` and its class name in `model_used`.

Return ONLY a JSON array of ipynb cells with "cell_type", "metadata", "source" (and "execution_count" and "outputs" for code cells). Do not wrap the array in markdown fences and do not add any other text."#,
        )
        .with_description("Appends model training cells")
        .with_variables(&["memory"]));

        self.add_template(PromptTemplate::new(
            names::EVALUATING,
            "You are a data scientist extending an existing Jupyter notebook. You answer with a JSON array of notebook cells only.",
            r#"The notebook already trains a model stored in `model`. These are the previous requests and the content you produced, oldest first:

{{memory}}

Write the evaluation cells:
1. Predict on `X_val` and compute accuracy, precision, recall and F1 score (weighted averages for multi-class targets).
2. Plot a confusion matrix or residuals as appropriate.
3. Summarise the results in a markdown cell.
4. The last code cell must print a JSON object:
{"accuracy": ..., "precision": ..., "recall": ..., "f1_score": ..., "model_used": model_used}

Return ONLY a JSON array of ipynb cells. Do not wrap the array in markdown fences and do not add any other text."#,
        )
        .with_description("Appends evaluation cells ending in a metrics object")
        .with_variables(&["memory"]));

        self.add_template(PromptTemplate::new(
            names::REMEDIATION,
            "You repair Jupyter notebook content that could not be parsed or failed when the notebook was executed. You answer with JSON only.",
            r#"Your previous answer could not be used.

ORIGINAL REQUEST:
{{user_prompt}}

YOUR PREVIOUS OUTPUT:
{{agent_output}}

ERROR MESSAGE:
{{error_message}}

ERROR DETAILS:
{{error_details}}

Fix the problem and answer the ORIGINAL REQUEST again. Keep exactly the output format it asks for: a notebook JSON object or a JSON array of notebook cells. Return only that JSON, without markdown fences or commentary."#,
        )
        .with_description("Asks the backend to correct its previous output")
        .with_variables(&["user_prompt", "agent_output", "error_message", "error_details"]));
    }
}

/// Replaces each `{{name}}` of `template` in one left-to-right pass.
/// Inserted values are copied verbatim and never scanned again.
fn substitute_variables(template: &str, variables: &[String], context: &PromptContext) -> String {
    let mut result = String::with_capacity(template.len());
    let mut missing = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            rest = &rest[start..];
            break;
        };

        let name = &after_open[..end];
        match context.get(name) {
            Some(value) => result.push_str(&value_to_string(value)),
            None => {
                if variables.iter().any(|v| v == name) {
                    missing.push(name);
                }
                result.push_str(&rest[start..start + 2 + end + 2]);
            }
        }
        rest = &after_open[end + 2..];
    }
    result.push_str(rest);

    if !missing.is_empty() {
        warn!(?missing, "Template rendered with unsubstituted placeholders");
    }

    result
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| "invalid_json".to_string())
        }
    }
}

pub mod context_builders {
    use super::*;
    use crate::memory::{MemoryEntry, MemoryStore};
    use crate::services::DatasetMetadata;
    use serde_json::json;

    pub fn dataset_context(metadata: &DatasetMetadata) -> PromptContext {
        let mut context = PromptContext::new();
        context.insert("title".to_string(), json!(metadata.title));
        context.insert("subtitle".to_string(), json!(metadata.subtitle));
        context.insert("description".to_string(), json!(metadata.description));
        context.insert("datasets".to_string(), json!(metadata.dataset_files()));
        context
    }

    pub fn memory_context(memory: &MemoryStore) -> PromptContext {
        let mut context = PromptContext::new();
        context.insert("memory".to_string(), json!(memory.render_context()));
        context
    }

    pub fn remediation_context(last: &MemoryEntry, failure: &AgentError) -> PromptContext {
        let mut context = PromptContext::new();
        context.insert("user_prompt".to_string(), json!(last.user_input()));
        context.insert("agent_output".to_string(), json!(last.agent_output()));
        context.insert("error_message".to_string(), json!(failure.message()));
        context.insert("error_details".to_string(), json!(failure.details()));
        context
    }
}
