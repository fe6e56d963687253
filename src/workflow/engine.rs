//! Workflow execution engine.
//!
//! A run walks the steps strictly sequentially: step N's output feeds step
//! N+1's prompt through the variable bag, so no parallelism across steps is
//! possible by construction. The first failing step aborts the run and its
//! error is returned verbatim; the accumulated variables are discarded.
//! Generation steps have no externally visible side effects until the
//! caller saves the result, so there is nothing to roll back.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::types::{Workflow, WorkflowStep};
use crate::error::{Error, Result};
use crate::generators::GeneratorRegistry;
use crate::settings::GenerationSettings;
use crate::storage::{SqliteStorage, StoredWorkflow};
use crate::vars::{interpolate, VariableBag};

/// State of a single workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    /// Executing the given 1-based step number
    Running(usize),
    Completed,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running(step) => write!(f, "running step {}", step),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Normalized result of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_number: usize,
    pub step_type: String,
    pub content: String,
    pub meta: Map<String, Value>,
    /// The prompt after variable interpolation
    pub prompt: String,
    /// The settings the generator actually ran with
    pub settings: GenerationSettings,
}

/// Aggregated result of a completed workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRunResult {
    pub workflow_id: String,
    pub workflow_name: String,
    /// All step contents joined by a blank line, trimmed
    pub content: String,
    /// Shallow merge of all step metas, later steps winning
    pub meta: Map<String, Value>,
    pub step_results: Vec<StepResult>,
}

/// Executes a single workflow step.
#[derive(Clone)]
pub struct StepExecutor {
    generators: GeneratorRegistry,
    defaults: GenerationSettings,
}

impl StepExecutor {
    pub fn new(generators: GeneratorRegistry, defaults: GenerationSettings) -> Self {
        Self {
            generators,
            defaults,
        }
    }

    /// Execute one step against the current variable bag.
    pub async fn execute(
        &self,
        step: &WorkflowStep,
        vars: &VariableBag,
        step_number: usize,
    ) -> Result<StepResult> {
        let prompt = interpolate(&step.prompt, vars);
        let settings = self.defaults.merged_with(&step.settings);
        let generator = self.generators.get(&step.step_type)?;

        debug!(
            "Executing step {} ({}) with {} variables",
            step_number,
            step.step_type,
            vars.len()
        );

        let output = generator.generate(&prompt, &settings).await?;

        Ok(StepResult {
            step_number,
            step_type: step.step_type.clone(),
            content: output.content,
            meta: output.meta,
            prompt,
            settings,
        })
    }
}

/// Owns workflow CRUD and run orchestration.
pub struct WorkflowEngine {
    storage: Arc<SqliteStorage>,
    executor: StepExecutor,
}

impl WorkflowEngine {
    pub fn new(storage: Arc<SqliteStorage>, executor: StepExecutor) -> Self {
        Self { storage, executor }
    }

    /// Validate, sanitize, and upsert a workflow. Returns its id.
    pub async fn save(&self, data: &Value) -> Result<String> {
        let workflow = Workflow::sanitize(data)?;

        self.storage
            .save_workflow(&StoredWorkflow {
                id: workflow.id.clone(),
                name: workflow.name.clone(),
                definition: workflow.to_definition()?,
                created_at: workflow.created_at,
                updated_at: workflow.updated_at,
            })
            .await?;

        info!("Saved workflow {} ({})", workflow.id, workflow.name);
        Ok(workflow.id)
    }

    /// Fetch a workflow by id, migrating legacy shapes on read.
    pub async fn get(&self, id: &str) -> Result<Option<Workflow>> {
        let record = match self.storage.get_workflow(id).await? {
            Some(record) => record,
            None => return Ok(None),
        };
        Ok(Some(parse_stored(&record)))
    }

    /// List all workflows, migrating legacy shapes on read.
    pub async fn list(&self) -> Result<Vec<Workflow>> {
        let records = self.storage.list_workflows().await?;
        Ok(records.iter().map(parse_stored).collect())
    }

    /// Delete a workflow. Returns true when it existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self.storage.delete_workflow(id).await?;
        if deleted {
            info!("Deleted workflow {}", id);
        }
        Ok(deleted)
    }

    /// Run a workflow with the given input variables.
    pub async fn run(&self, id: &str, input: VariableBag) -> Result<WorkflowRunResult> {
        let workflow = self
            .get(id)
            .await?
            .ok_or_else(|| Error::WorkflowNotFound(id.to_string()))?;

        let mut state = RunState::Pending;
        let mut vars = input;
        let mut results: Vec<StepResult> = Vec::with_capacity(workflow.steps.len());

        info!(
            "Running workflow {} ({}) with {} steps: {}",
            workflow.id,
            workflow.name,
            workflow.steps.len(),
            state
        );

        for (index, step) in workflow.steps.iter().enumerate() {
            let step_number = index + 1;
            state = RunState::Running(step_number);
            debug!("Workflow {} {}", workflow.id, state);

            let step_result = match self.executor.execute(step, &vars, step_number).await {
                Ok(step_result) => step_result,
                Err(e) => {
                    state = RunState::Failed;
                    warn!(
                        "Workflow {} {} at step {}: {}",
                        workflow.id, state, step_number, e
                    );
                    // Fail fast: no further steps run, accumulated
                    // variables are discarded with this frame.
                    return Err(e);
                }
            };

            vars.set_string(format!("step_{}", step_number), step_result.content.clone());
            vars.set_value(
                format!("step_{}_meta", step_number),
                Value::Object(step_result.meta.clone()),
            );
            results.push(step_result);
        }

        state = RunState::Completed;
        info!("Workflow {} {}", workflow.id, state);

        let content = results
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
            .trim()
            .to_string();

        let mut meta = Map::new();
        for result in &results {
            for (key, value) in &result.meta {
                meta.insert(key.clone(), value.clone());
            }
        }

        Ok(WorkflowRunResult {
            workflow_id: workflow.id,
            workflow_name: workflow.name,
            content,
            meta,
            step_results: results,
        })
    }
}

fn parse_stored(record: &StoredWorkflow) -> Workflow {
    let value: Value = serde_json::from_str(&record.definition).unwrap_or(Value::Null);
    let mut workflow = Workflow::from_value(&value);
    if workflow.id.is_empty() {
        workflow.id = record.id.clone();
    }
    workflow
}
