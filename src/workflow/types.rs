//! Workflow type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::settings::SettingsPatch;

/// Content type assigned to steps that don't declare one.
pub const DEFAULT_STEP_TYPE: &str = "blog_post";

const DEFAULT_WORKFLOW_NAME: &str = "Untitled Workflow";

/// One generation step within a workflow.
///
/// Order matters: the array index is the execution order, and step numbers
/// are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Content-type tag resolved against the generator registry
    #[serde(rename = "type", default = "default_step_type")]
    pub step_type: String,

    /// Prompt template; `{{name}}` placeholders are interpolated at run time
    #[serde(default)]
    pub prompt: String,

    /// Step-level settings overrides
    #[serde(default, skip_serializing_if = "SettingsPatch::is_empty")]
    pub settings: SettingsPatch,
}

fn default_step_type() -> String {
    DEFAULT_STEP_TYPE.to_string()
}

/// An ordered list of generation steps with variable passing between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Opaque identifier, generated on first save
    #[serde(default)]
    pub id: String,

    #[serde(default = "default_workflow_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Always a list after sanitization, never absent
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_workflow_name() -> String {
    DEFAULT_WORKFLOW_NAME.to_string()
}

impl Workflow {
    /// Build a workflow from stored or submitted JSON, coercing legacy
    /// shapes instead of failing.
    ///
    /// Workflows written by older versions may lack `steps` entirely or
    /// hold a non-list value there; both are coerced to an empty list.
    /// Steps missing `type` or `prompt` get defaults. This lazy migration
    /// runs on every read.
    pub fn from_value(value: &Value) -> Workflow {
        let obj = value.as_object();
        let get_str = |key: &str| -> Option<String> {
            obj.and_then(|o| o.get(key))
                .and_then(|v| v.as_str())
                .map(String::from)
        };
        let get_time = |key: &str| -> Option<DateTime<Utc>> {
            get_str(key)
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        };

        let steps = obj
            .and_then(|o| o.get("steps"))
            .and_then(|v| v.as_array())
            .map(|steps| steps.iter().map(step_from_value).collect())
            .unwrap_or_default();

        Workflow {
            id: get_str("id").unwrap_or_default(),
            name: get_str("name").unwrap_or_else(default_workflow_name),
            description: get_str("description").unwrap_or_default(),
            steps,
            created_at: get_time("created_at").unwrap_or_else(Utc::now),
            updated_at: get_time("updated_at").unwrap_or_else(Utc::now),
        }
    }

    /// Validate and sanitize submitted workflow data for saving.
    ///
    /// Generates an id when absent, fills field defaults, and clamps step
    /// settings. Returns `InvalidWorkflowData` for empty or non-object
    /// input. Sanitization is idempotent aside from `updated_at`.
    pub fn sanitize(value: &Value) -> Result<Workflow> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidWorkflowData("expected a JSON object".to_string()))?;
        if obj.is_empty() {
            return Err(Error::InvalidWorkflowData(
                "no workflow data received".to_string(),
            ));
        }

        let mut workflow = Workflow::from_value(value);

        if workflow.id.is_empty() {
            workflow.id = format!("wf_{}", Uuid::new_v4().simple());
        }
        workflow.name = workflow.name.trim().to_string();
        if workflow.name.is_empty() {
            workflow.name = default_workflow_name();
        }
        workflow.description = workflow.description.trim().to_string();

        for step in &mut workflow.steps {
            step.step_type = step.step_type.trim().to_string();
            if step.step_type.is_empty() {
                step.step_type = default_step_type();
            }
            step.settings = step.settings.sanitized();
        }

        workflow.updated_at = Utc::now();
        Ok(workflow)
    }

    /// Serialize to the canonical JSON stored in the workflow store.
    pub fn to_definition(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn step_from_value(value: &Value) -> WorkflowStep {
    let obj = value.as_object();
    WorkflowStep {
        step_type: obj
            .and_then(|o| o.get("type"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(default_step_type),
        prompt: obj
            .and_then(|o| o.get("prompt"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_default(),
        settings: obj
            .and_then(|o| o.get("settings"))
            .map(SettingsPatch::from_value)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_fills_defaults() {
        let workflow = Workflow::sanitize(&json!({
            "name": "  Blog pipeline  ",
            "steps": [
                {"prompt": "Write about {{topic}}"},
                {"type": "", "prompt": "Promote: {{step_1}}"},
            ],
        }))
        .unwrap();

        assert!(workflow.id.starts_with("wf_"));
        assert_eq!(workflow.name, "Blog pipeline");
        assert_eq!(workflow.steps.len(), 2);
        assert_eq!(workflow.steps[0].step_type, "blog_post");
        assert_eq!(workflow.steps[1].step_type, "blog_post");
        assert_eq!(workflow.steps[1].prompt, "Promote: {{step_1}}");
    }

    #[test]
    fn test_sanitize_rejects_empty() {
        assert_eq!(
            Workflow::sanitize(&json!({})).unwrap_err().code(),
            "INVALID_WORKFLOW_DATA"
        );
        assert_eq!(
            Workflow::sanitize(&json!("not an object")).unwrap_err().code(),
            "INVALID_WORKFLOW_DATA"
        );
    }

    #[test]
    fn test_sanitize_keeps_existing_id() {
        let workflow = Workflow::sanitize(&json!({
            "id": "wf_existing",
            "name": "Keep",
            "steps": [],
        }))
        .unwrap();
        assert_eq!(workflow.id, "wf_existing");
    }

    #[test]
    fn test_sanitize_clamps_step_settings() {
        let workflow = Workflow::sanitize(&json!({
            "name": "Clamped",
            "steps": [{"type": "blog_post", "prompt": "p", "settings": {"length": 99999}}],
        }))
        .unwrap();
        assert_eq!(
            workflow.steps[0].settings.length,
            Some(crate::settings::MAX_LENGTH)
        );
    }

    #[test]
    fn test_sanitize_idempotent_steps() {
        let first = Workflow::sanitize(&json!({
            "name": "Once",
            "steps": [
                {"type": "social_media", "prompt": "A", "settings": {"length": 2, "creativity": 5.0}},
                {"prompt": "B"},
            ],
        }))
        .unwrap();

        let again = Workflow::sanitize(&serde_json::to_value(&first).unwrap()).unwrap();

        // Byte-for-byte equal steps aside from updated_at.
        assert_eq!(
            serde_json::to_string(&first.steps).unwrap(),
            serde_json::to_string(&again.steps).unwrap()
        );
        assert_eq!(first.id, again.id);
        assert_eq!(first.created_at, again.created_at);
    }

    #[test]
    fn test_migration_coerces_missing_steps() {
        let workflow = Workflow::from_value(&json!({"id": "wf_1", "name": "Old"}));
        assert!(workflow.steps.is_empty());
    }

    #[test]
    fn test_migration_coerces_non_list_steps() {
        let workflow = Workflow::from_value(&json!({
            "id": "wf_1",
            "name": "Broken",
            "steps": "oops",
        }));
        assert!(workflow.steps.is_empty());
    }

    #[test]
    fn test_migration_defaults_step_fields() {
        let workflow = Workflow::from_value(&json!({
            "id": "wf_1",
            "steps": [{}, {"type": "image"}],
        }));
        assert_eq!(workflow.steps[0].step_type, "blog_post");
        assert_eq!(workflow.steps[0].prompt, "");
        assert_eq!(workflow.steps[1].step_type, "image");
    }

    #[test]
    fn test_definition_round_trip() {
        let workflow = Workflow::sanitize(&json!({
            "name": "RT",
            "steps": [{"type": "blog_post", "prompt": "Write about {{topic}}"}],
        }))
        .unwrap();

        let definition = workflow.to_definition().unwrap();
        let reloaded = Workflow::from_value(&serde_json::from_str(&definition).unwrap());
        assert_eq!(reloaded.steps, workflow.steps);
        assert_eq!(reloaded.name, workflow.name);
    }
}
