//! Provider registry - manages the catalog of supported providers.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::{AuthScheme, Capability, Provider, ProviderLimits};

/// Registry of supported providers.
///
/// Read-only after startup. Additional providers can be added at
/// construction time via [`ProviderRegistry::register`], which is the
/// extension point for custom integrations.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<Provider>>,
}

impl ProviderRegistry {
    /// Create a registry with the built-in provider catalog.
    pub fn new() -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
        };

        registry.register(openai());
        registry.register(stabilityai());
        registry.register(elevenlabs());
        registry.register(synthesia());

        registry
    }

    /// Create an empty registry (for testing).
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider. Replaces any existing provider with the same name.
    pub fn register(&mut self, provider: Provider) {
        self.providers
            .insert(provider.name.clone(), Arc::new(provider));
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<Provider>> {
        self.providers.get(name).cloned()
    }

    /// Check if a provider is registered.
    pub fn has(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// All registered provider names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// All registered providers, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Provider>> {
        let mut providers: Vec<&Arc<Provider>> = self.providers.values().collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name));
        providers.into_iter()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn openai() -> Provider {
    let mut endpoints = HashMap::new();
    endpoints.insert(
        Capability::Text,
        "https://api.openai.com/v1/completions".to_string(),
    );
    endpoints.insert(
        Capability::Chat,
        "https://api.openai.com/v1/chat/completions".to_string(),
    );
    endpoints.insert(
        Capability::Image,
        "https://api.openai.com/v1/images/generations".to_string(),
    );

    Provider {
        name: "openai".to_string(),
        display_name: "OpenAI".to_string(),
        endpoints,
        auth: AuthScheme::Bearer,
        test_prompt: "Respond with \"OK\" if operational".to_string(),
        path_params: HashMap::new(),
        limits: ProviderLimits {
            requests_per_window: 60,
            window_secs: 60,
        },
    }
}

fn stabilityai() -> Provider {
    let mut endpoints = HashMap::new();
    endpoints.insert(
        Capability::Image,
        "https://api.stability.ai/v1/generation/{engine}/text-to-image".to_string(),
    );
    let mut path_params = HashMap::new();
    path_params.insert(
        "engine".to_string(),
        "stable-diffusion-xl-1024-v1-0".to_string(),
    );

    Provider {
        name: "stabilityai".to_string(),
        display_name: "Stability AI".to_string(),
        endpoints,
        auth: AuthScheme::Raw,
        test_prompt: "Test connection".to_string(),
        path_params,
        limits: ProviderLimits {
            requests_per_window: 30,
            window_secs: 60,
        },
    }
}

fn elevenlabs() -> Provider {
    let mut endpoints = HashMap::new();
    endpoints.insert(
        Capability::Voice,
        "https://api.elevenlabs.io/v1/text-to-speech/{voice_id}".to_string(),
    );
    let mut path_params = HashMap::new();
    path_params.insert("voice_id".to_string(), "21m00Tcm4TlvDq8ikWAM".to_string());

    Provider {
        name: "elevenlabs".to_string(),
        display_name: "ElevenLabs".to_string(),
        endpoints,
        auth: AuthScheme::Header("xi-api-key".to_string()),
        test_prompt: "Hello".to_string(),
        path_params,
        limits: ProviderLimits {
            requests_per_window: 100,
            window_secs: 3600,
        },
    }
}

fn synthesia() -> Provider {
    let mut endpoints = HashMap::new();
    endpoints.insert(
        Capability::Video,
        "https://api.synthesia.io/v2/videos".to_string(),
    );

    Provider {
        name: "synthesia".to_string(),
        display_name: "Synthesia".to_string(),
        endpoints,
        auth: AuthScheme::Raw,
        test_prompt: "Test".to_string(),
        path_params: HashMap::new(),
        limits: ProviderLimits {
            requests_per_window: 20,
            window_secs: 3600,
        },
    }
}
