//! Generation settings.
//!
//! A typed settings struct with documented defaults replaces the loose
//! associative-array merging of ad-hoc settings maps. Step-level overrides
//! are expressed as a [`SettingsPatch`] and merged field by field, with the
//! step value winning on conflict.

use serde::{Deserialize, Serialize};

/// Writing tone for text generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Professional,
    Casual,
    Friendly,
    Humorous,
    Academic,
    Persuasive,
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Professional
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tone::Professional => write!(f, "professional"),
            Tone::Casual => write!(f, "casual"),
            Tone::Friendly => write!(f, "friendly"),
            Tone::Humorous => write!(f, "humorous"),
            Tone::Academic => write!(f, "academic"),
            Tone::Persuasive => write!(f, "persuasive"),
        }
    }
}

impl std::str::FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "professional" => Ok(Tone::Professional),
            "casual" => Ok(Tone::Casual),
            "friendly" => Ok(Tone::Friendly),
            "humorous" => Ok(Tone::Humorous),
            "academic" => Ok(Tone::Academic),
            "persuasive" => Ok(Tone::Persuasive),
            _ => Err(format!("Unknown tone: {}", s)),
        }
    }
}

/// Bounds for the target length setting (words).
pub const MIN_LENGTH: u32 = 300;
pub const MAX_LENGTH: u32 = 5000;

/// Bounds for the creativity (sampling temperature) setting.
pub const MIN_CREATIVITY: f32 = 0.1;
pub const MAX_CREATIVITY: f32 = 1.0;

/// Resolved generation settings passed to generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Writing tone
    pub tone: Tone,
    /// Target length in words, clamped to 300..=5000
    pub length: u32,
    /// Sampling temperature, clamped to 0.1..=1.0
    pub creativity: f32,
    /// Output language code (e.g. "en_US")
    pub language: String,
    /// Whether generated articles should request accompanying images
    pub include_images: bool,
    /// Whether to derive SEO metadata from generated content
    pub include_seo: bool,
    /// Intended audience (free-form tag, e.g. "general", "business")
    pub target_audience: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            tone: Tone::default(),
            length: 800,
            creativity: 0.7,
            language: "en_US".to_string(),
            include_images: true,
            include_seo: true,
            target_audience: "general".to_string(),
        }
    }
}

impl GenerationSettings {
    /// Apply a step-level patch on top of these settings.
    ///
    /// Merged field by field; a field present in the patch wins. Patch
    /// values are clamped to the documented bounds, so the result is always
    /// valid regardless of input.
    pub fn merged_with(&self, patch: &SettingsPatch) -> GenerationSettings {
        let mut merged = self.clone();
        if let Some(tone) = patch.tone {
            merged.tone = tone;
        }
        if let Some(length) = patch.length {
            merged.length = length.clamp(MIN_LENGTH, MAX_LENGTH);
        }
        if let Some(creativity) = patch.creativity {
            merged.creativity = creativity.clamp(MIN_CREATIVITY, MAX_CREATIVITY);
        }
        if let Some(language) = &patch.language {
            merged.language = language.clone();
        }
        if let Some(include_images) = patch.include_images {
            merged.include_images = include_images;
        }
        if let Some(include_seo) = patch.include_seo {
            merged.include_seo = include_seo;
        }
        if let Some(target_audience) = &patch.target_audience {
            merged.target_audience = target_audience.clone();
        }
        merged
    }
}

/// Partial settings as stored on a workflow step or submitted with a
/// one-off generation request. Unknown fields are ignored on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creativity: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_images: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_seo: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
}

impl SettingsPatch {
    /// Parse a patch from loose JSON, dropping fields that fail to parse.
    ///
    /// An invalid tone string or a non-numeric length is discarded rather
    /// than failing the whole patch, so stored workflows with stale values
    /// still load.
    pub fn from_value(value: &serde_json::Value) -> SettingsPatch {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => return SettingsPatch::default(),
        };

        SettingsPatch {
            tone: obj
                .get("tone")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok()),
            length: obj.get("length").and_then(|v| v.as_u64()).map(|n| n as u32),
            creativity: obj
                .get("creativity")
                .and_then(|v| v.as_f64())
                .map(|f| f as f32),
            language: obj
                .get("language")
                .and_then(|v| v.as_str())
                .map(String::from),
            include_images: obj.get("include_images").and_then(|v| v.as_bool()),
            include_seo: obj.get("include_seo").and_then(|v| v.as_bool()),
            target_audience: obj
                .get("target_audience")
                .and_then(|v| v.as_str())
                .map(String::from),
        }
    }

    /// Clamp all present fields to their documented bounds.
    ///
    /// Sanitization is idempotent: sanitizing an already-sanitized patch
    /// yields an identical patch.
    pub fn sanitized(&self) -> SettingsPatch {
        let mut patch = self.clone();
        if let Some(length) = patch.length {
            patch.length = Some(length.clamp(MIN_LENGTH, MAX_LENGTH));
        }
        if let Some(creativity) = patch.creativity {
            patch.creativity = Some(creativity.clamp(MIN_CREATIVITY, MAX_CREATIVITY));
        }
        patch
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = GenerationSettings::default();
        assert_eq!(settings.tone, Tone::Professional);
        assert_eq!(settings.length, 800);
        assert!((settings.creativity - 0.7).abs() < f32::EPSILON);
        assert!(settings.include_seo);
        assert_eq!(settings.target_audience, "general");
    }

    #[test]
    fn test_merge_step_wins() {
        let defaults = GenerationSettings::default();
        let patch = SettingsPatch {
            tone: Some(Tone::Casual),
            length: Some(1200),
            ..Default::default()
        };

        let merged = defaults.merged_with(&patch);
        assert_eq!(merged.tone, Tone::Casual);
        assert_eq!(merged.length, 1200);
        // Untouched fields keep defaults
        assert_eq!(merged.target_audience, "general");
        assert!((merged.creativity - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_merge_clamps() {
        let defaults = GenerationSettings::default();
        let patch = SettingsPatch {
            length: Some(50_000),
            creativity: Some(3.5),
            ..Default::default()
        };

        let merged = defaults.merged_with(&patch);
        assert_eq!(merged.length, MAX_LENGTH);
        assert!((merged.creativity - MAX_CREATIVITY).abs() < f32::EPSILON);
    }

    #[test]
    fn test_patch_from_value_lenient() {
        let patch = SettingsPatch::from_value(&json!({
            "tone": "humorous",
            "length": 600,
            "creativity": 0.9,
            "unknown_field": "ignored"
        }));

        assert_eq!(patch.tone, Some(Tone::Humorous));
        assert_eq!(patch.length, Some(600));
        assert_eq!(patch.creativity, Some(0.9));
        assert_eq!(patch.language, None);
    }

    #[test]
    fn test_patch_from_value_drops_invalid_tone() {
        let patch = SettingsPatch::from_value(&json!({"tone": "shouty"}));
        assert_eq!(patch.tone, None);
    }

    #[test]
    fn test_sanitize_idempotent() {
        let patch = SettingsPatch {
            length: Some(10),
            creativity: Some(9.0),
            ..Default::default()
        };

        let once = patch.sanitized();
        let twice = once.sanitized();
        assert_eq!(once, twice);
        assert_eq!(once.length, Some(MIN_LENGTH));
        assert_eq!(once.creativity, Some(MAX_CREATIVITY));
    }

    #[test]
    fn test_tone_round_trip() {
        for tone in [
            Tone::Professional,
            Tone::Casual,
            Tone::Friendly,
            Tone::Humorous,
            Tone::Academic,
            Tone::Persuasive,
        ] {
            let parsed: Tone = tone.to_string().parse().unwrap();
            assert_eq!(parsed, tone);
        }
    }
}
