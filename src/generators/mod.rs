//! Content generators - one per content type.

mod media;
mod registry;
mod text;
mod types;

pub use media::{ImageGenerator, VideoGenerator, VoiceGenerator};
pub use registry::GeneratorRegistry;
pub use text::{
    BlogPostGenerator, LandingPageGenerator, NewsletterGenerator, ProductDescriptionGenerator,
    SocialMediaGenerator,
};
pub use types::{GenerationOutput, Generator};
