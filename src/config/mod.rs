//! Configuration management.
//!
//! Configuration comes from a TOML file (`~/.config/genpress/config.toml`)
//! with `GENPRESS_*` environment variables taking precedence. Provider
//! quotas and model identifiers are configuration, not contract: the
//! built-in catalog supplies defaults and any of them can be overridden
//! here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::providers::ProviderRegistry;
use crate::settings::{GenerationSettings, SettingsPatch};

/// genpress configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Generation model/provider choices
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Default generation settings applied beneath step overrides
    #[serde(default)]
    pub defaults: SettingsPatch,

    /// Per-provider keys and quota overrides, keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Generation model and provider choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Chat model for text content types
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Provider backing the `image` content type
    #[serde(default = "default_image_provider")]
    pub image_provider: String,

    /// Avatar identifier for the `video` content type
    #[serde(default = "default_video_avatar")]
    pub video_avatar: String,

    /// Content-cache time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// API log retention in days
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: i64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            text_model: default_text_model(),
            image_provider: default_image_provider(),
            video_avatar: default_video_avatar(),
            cache_ttl_secs: default_cache_ttl_secs(),
            log_retention_days: default_log_retention_days(),
        }
    }
}

fn default_text_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_image_provider() -> String {
    "stabilityai".to_string()
}

fn default_video_avatar() -> String {
    "anna_costume1_cameraA".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    86_400
}

fn default_log_retention_days() -> i64 {
    7
}

/// Per-provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for this provider
    #[serde(default)]
    pub api_key: Option<String>,

    /// Override for the provider's calls-per-window budget
    #[serde(default)]
    pub requests_per_window: Option<u32>,

    /// Override for the provider's window length in seconds
    #[serde(default)]
    pub window_secs: Option<u64>,
}

impl Config {
    /// Load configuration from the default locations.
    pub fn load() -> Self {
        let mut config = Self::default();

        let path = Self::config_dir().join("config.toml");
        if let Ok(partial) = Self::load_partial_from_path(&path) {
            config.apply_partial(partial);
        }

        config.apply_env_overrides();
        config
    }

    /// Get the data directory.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("genpress"))
            .unwrap_or_else(|| PathBuf::from(".genpress"))
    }

    /// Get the config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("genpress"))
            .unwrap_or_else(|| PathBuf::from(".genpress"))
    }

    /// Resolved database path (configured, or the default data location).
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("genpress.db"))
    }

    /// Stored API keys by provider name.
    pub fn api_keys(&self) -> HashMap<String, String> {
        self.providers
            .iter()
            .filter_map(|(name, provider)| {
                provider
                    .api_key
                    .as_ref()
                    .filter(|k| !k.is_empty())
                    .map(|k| (name.clone(), k.clone()))
            })
            .collect()
    }

    /// Default generation settings (built-in defaults plus config patch).
    pub fn default_settings(&self) -> GenerationSettings {
        GenerationSettings::default().merged_with(&self.defaults.sanitized())
    }

    /// Apply configured quota overrides to a provider registry.
    pub fn apply_quota_overrides(&self, registry: &mut ProviderRegistry) {
        for (name, overrides) in &self.providers {
            let Some(provider) = registry.get(name) else {
                continue;
            };
            if overrides.requests_per_window.is_none() && overrides.window_secs.is_none() {
                continue;
            }
            let mut provider = provider.as_ref().clone();
            if let Some(requests) = overrides.requests_per_window {
                provider.limits.requests_per_window = requests;
            }
            if let Some(window) = overrides.window_secs {
                provider.limits.window_secs = window;
            }
            registry.register(provider);
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("GENPRESS_DATABASE_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
        if let Ok(model) = std::env::var("GENPRESS_TEXT_MODEL") {
            self.generation.text_model = model;
        }
        if let Ok(provider) = std::env::var("GENPRESS_IMAGE_PROVIDER") {
            self.generation.image_provider = provider;
        }
        if let Ok(ttl) = std::env::var("GENPRESS_CACHE_TTL_SECS") {
            if let Ok(parsed) = ttl.parse::<u64>() {
                self.generation.cache_ttl_secs = parsed;
            }
        }

        // GENPRESS_<PROVIDER>_API_KEY, e.g. GENPRESS_OPENAI_API_KEY
        for name in ["openai", "stabilityai", "elevenlabs", "synthesia"] {
            let var = format!("GENPRESS_{}_API_KEY", name.to_uppercase());
            if let Ok(key) = std::env::var(&var) {
                self.providers.entry(name.to_string()).or_default().api_key = Some(key);
            }
        }
    }

    fn load_partial_from_path(path: &Path) -> std::result::Result<PartialConfig, ()> {
        let content = std::fs::read_to_string(path).map_err(|_| ())?;
        toml::from_str(&content).map_err(|_| ())
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(storage) = partial.storage {
            self.storage = storage;
        }
        if let Some(generation) = partial.generation {
            self.generation = generation;
        }
        if let Some(defaults) = partial.defaults {
            self.defaults = defaults;
        }
        if let Some(providers) = partial.providers {
            self.providers = providers;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    storage: Option<StorageConfig>,
    generation: Option<GenerationConfig>,
    defaults: Option<SettingsPatch>,
    providers: Option<HashMap<String, ProviderConfig>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Tone;

    #[test]
    fn test_generation_defaults() {
        let config = Config::default();
        assert_eq!(config.generation.text_model, "gpt-3.5-turbo");
        assert_eq!(config.generation.image_provider, "stabilityai");
        assert_eq!(config.generation.cache_ttl_secs, 86_400);
        assert_eq!(config.generation.log_retention_days, 7);
    }

    #[test]
    fn test_default_settings_apply_patch() {
        let mut config = Config::default();
        config.defaults.tone = Some(Tone::Friendly);
        config.defaults.length = Some(50); // clamped up to the minimum

        let settings = config.default_settings();
        assert_eq!(settings.tone, Tone::Friendly);
        assert_eq!(settings.length, crate::settings::MIN_LENGTH);
    }

    #[test]
    fn test_api_keys_skip_empty() {
        let mut config = Config::default();
        config.providers.insert(
            "openai".to_string(),
            ProviderConfig {
                api_key: Some("sk-test".to_string()),
                ..Default::default()
            },
        );
        config.providers.insert(
            "elevenlabs".to_string(),
            ProviderConfig {
                api_key: Some(String::new()),
                ..Default::default()
            },
        );

        let keys = config.api_keys();
        assert_eq!(keys.get("openai").map(String::as_str), Some("sk-test"));
        assert!(!keys.contains_key("elevenlabs"));
    }

    #[test]
    fn test_quota_overrides() {
        let mut config = Config::default();
        config.providers.insert(
            "openai".to_string(),
            ProviderConfig {
                requests_per_window: Some(5),
                window_secs: Some(120),
                ..Default::default()
            },
        );

        let mut registry = ProviderRegistry::new();
        config.apply_quota_overrides(&mut registry);

        let openai = registry.get("openai").unwrap();
        assert_eq!(openai.limits.requests_per_window, 5);
        assert_eq!(openai.limits.window_secs, 120);

        // Untouched providers keep catalog defaults.
        let elevenlabs = registry.get("elevenlabs").unwrap();
        assert_eq!(elevenlabs.limits.requests_per_window, 100);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
            [generation]
            text_model = "gpt-4o-mini"

            [providers.openai]
            api_key = "sk-abc"
            requests_per_window = 10
        "#;
        let partial: PartialConfig = toml::from_str(toml_str).unwrap();
        let mut config = Config::default();
        config.apply_partial(partial);

        assert_eq!(config.generation.text_model, "gpt-4o-mini");
        assert_eq!(
            config.providers["openai"].api_key.as_deref(),
            Some("sk-abc")
        );
        // Unset fields fall back to serde defaults.
        assert_eq!(config.generation.image_provider, "stabilityai");
    }
}
