//! Generator trait and output types.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::settings::GenerationSettings;

/// Result of a generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    /// The generated content (text, or a reference for media types)
    pub content: String,
    /// Capability-specific metadata (model, usage, SEO fields, ...)
    pub meta: Map<String, Value>,
}

impl GenerationOutput {
    /// Create an output with just content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            meta: Map::new(),
        }
    }

    /// Create an output with content and metadata.
    pub fn with_meta(content: impl Into<String>, meta: Map<String, Value>) -> Self {
        Self {
            content: content.into(),
            meta,
        }
    }
}

/// Trait implemented by every content-type generator.
///
/// Generators are content-type-aware: the same provider capability can
/// back several content types with different prompt framing and payload
/// shapes. New content types register an implementation rather than
/// patching a match statement.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Content-type tag this generator handles (e.g. "blog_post").
    fn content_type(&self) -> &str;

    /// Generate content for an already-interpolated prompt.
    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<GenerationOutput>;

    /// Short description for listings.
    fn description(&self) -> &str {
        "A content generator"
    }
}

impl std::fmt::Debug for dyn Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("content_type", &self.content_type())
            .finish()
    }
}
