//! Workflow definitions and the execution engine.

mod engine;
mod types;

pub use engine::{RunState, StepExecutor, StepResult, WorkflowEngine, WorkflowRunResult};
pub use types::{Workflow, WorkflowStep, DEFAULT_STEP_TYPE};
