//! Generator registry - maps content-type tags to generators.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::Generator;
use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::gateway::Gateway;

/// Registry of available content-type generators.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn Generator>>,
}

impl GeneratorRegistry {
    /// Create a registry with the built-in generators wired to a gateway.
    pub fn new(gateway: Arc<Gateway>, config: &GenerationConfig) -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(super::BlogPostGenerator::new(
            gateway.clone(),
            config.text_model.clone(),
        )));
        registry.register(Arc::new(super::ProductDescriptionGenerator::new(
            gateway.clone(),
            config.text_model.clone(),
        )));
        registry.register(Arc::new(super::SocialMediaGenerator::new(
            gateway.clone(),
            config.text_model.clone(),
        )));
        registry.register(Arc::new(super::NewsletterGenerator::new(
            gateway.clone(),
            config.text_model.clone(),
        )));
        registry.register(Arc::new(super::LandingPageGenerator::new(
            gateway.clone(),
            config.text_model.clone(),
        )));
        registry.register(Arc::new(super::ImageGenerator::new(
            gateway.clone(),
            config.image_provider.clone(),
        )));
        registry.register(Arc::new(super::VoiceGenerator::new(gateway.clone())));
        registry.register(Arc::new(super::VideoGenerator::new(
            gateway,
            config.video_avatar.clone(),
        )));

        registry
    }

    /// Create an empty registry (for testing and custom stacks).
    pub fn empty() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    /// Register a generator. Replaces any generator with the same tag.
    pub fn register(&mut self, generator: Arc<dyn Generator>) {
        self.generators
            .insert(generator.content_type().to_string(), generator);
    }

    /// Resolve a generator for a content-type tag.
    pub fn get(&self, content_type: &str) -> Result<Arc<dyn Generator>> {
        self.generators
            .get(content_type)
            .cloned()
            .ok_or_else(|| Error::InvalidContentType(content_type.to_string()))
    }

    /// Check whether a content type is registered.
    pub fn has(&self, content_type: &str) -> bool {
        self.generators.contains_key(content_type)
    }

    /// All registered content-type tags, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.generators.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// Tags with descriptions, sorted by tag.
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .generators
            .iter()
            .map(|(tag, generator)| (tag.as_str(), generator.description()))
            .collect();
        entries.sort_by_key(|(tag, _)| *tag);
        entries
    }
}
