//! Variable interpolation for prompts.
//!
//! Workflow prompts may reference `{{name}}` placeholders that are filled
//! from the accumulating variable bag. Only string-valued variables are
//! substituted; structured values (per-step metadata objects) are skipped
//! rather than stringified. Substitution is a single scan over the
//! template, so a substituted value's own `{{...}}` markers are never
//! re-expanded.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;

/// The accumulating string-keyed context for a workflow run.
///
/// Input variables plus `step_<n>` (content) and `step_<n>_meta`
/// (metadata object) entries for each completed step.
#[derive(Debug, Clone, Default)]
pub struct VariableBag {
    values: HashMap<String, Value>,
}

impl VariableBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from string input variables.
    pub fn from_strings(input: HashMap<String, String>) -> Self {
        let values = input
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Self { values }
    }

    /// Build a bag from arbitrary JSON input variables.
    pub fn from_values(input: HashMap<String, Value>) -> Self {
        Self { values: input }
    }

    /// Set a string variable.
    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), Value::String(value.into()));
    }

    /// Set an arbitrary JSON variable.
    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Get a variable's string value, if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    /// Get a variable's raw JSON value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Number of variables in the bag.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the bag holds no variables.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn placeholder_regex() -> &'static regex_lite::Regex {
    static PLACEHOLDER_REGEX: OnceLock<regex_lite::Regex> = OnceLock::new();
    PLACEHOLDER_REGEX
        .get_or_init(|| regex_lite::Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("valid regex"))
}

/// Substitute `{{name}}` placeholders in `template` from the bag.
///
/// Placeholders with no matching string variable are left as-is.
pub fn interpolate(template: &str, vars: &VariableBag) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &regex_lite::Captures| {
            let key = &caps[1];
            match vars.get_str(key) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interpolate_basic() {
        let mut vars = VariableBag::new();
        vars.set_string("topic", "rust");

        assert_eq!(
            interpolate("Write about {{topic}}", &vars),
            "Write about rust"
        );
    }

    #[test]
    fn test_interpolate_multiple_occurrences() {
        let mut vars = VariableBag::new();
        vars.set_string("name", "Ada");

        assert_eq!(
            interpolate("{{name}} and {{name}} again", &vars),
            "Ada and Ada again"
        );
    }

    #[test]
    fn test_interpolate_unknown_left_intact() {
        let vars = VariableBag::new();
        assert_eq!(interpolate("Hello {{missing}}", &vars), "Hello {{missing}}");
    }

    #[test]
    fn test_interpolate_not_recursive() {
        let mut vars = VariableBag::new();
        vars.set_string("a", "{{b}}");
        vars.set_string("b", "X");

        // A substituted value's own markers are not re-expanded.
        assert_eq!(interpolate("{{a}}", &vars), "{{b}}");
    }

    #[test]
    fn test_interpolate_skips_non_string_values() {
        let mut vars = VariableBag::new();
        vars.set_value("step_1_meta", json!({"model": "gpt-3.5-turbo"}));

        assert_eq!(
            interpolate("meta: {{step_1_meta}}", &vars),
            "meta: {{step_1_meta}}"
        );
    }

    #[test]
    fn test_interpolate_replacement_with_special_chars() {
        let mut vars = VariableBag::new();
        vars.set_string("sum", "costs $100 (50%)");

        assert_eq!(interpolate("Note: {{sum}}", &vars), "Note: costs $100 (50%)");
    }

    #[test]
    fn test_bag_from_strings() {
        let mut input = HashMap::new();
        input.insert("topic".to_string(), "AI".to_string());
        let vars = VariableBag::from_strings(input);

        assert_eq!(vars.get_str("topic"), Some("AI"));
        assert_eq!(vars.len(), 1);
    }
}
