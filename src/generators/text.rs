//! Text content generators.
//!
//! All five text content types ride the same chat capability; what differs
//! is the system framing each type puts around the caller's prompt.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::types::{GenerationOutput, Generator};
use crate::content;
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::providers::{payloads, Capability};
use crate::settings::GenerationSettings;

/// Run one chat completion and normalize the response.
async fn chat(
    gateway: &Gateway,
    model: &str,
    system: &str,
    prompt: &str,
    settings: &GenerationSettings,
) -> Result<(String, Map<String, Value>)> {
    let payload = payloads::chat_payload(model, system, prompt, settings);
    let response = gateway
        .request("openai", Capability::Chat, payload, None)
        .await?;

    let text = extract_chat_content(&response)?;

    let mut meta = Map::new();
    meta.insert("model".to_string(), json!(model));
    if let Some(usage) = response.get("usage") {
        meta.insert("usage".to_string(), usage.clone());
    }
    if let Some(reason) = response.pointer("/choices/0/finish_reason") {
        meta.insert("finish_reason".to_string(), reason.clone());
    }

    Ok((text, meta))
}

/// Pull the assistant message out of a chat-completion response.
fn extract_chat_content(response: &Value) -> Result<String> {
    response
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::Api {
            status: 200,
            message: "Response is missing choices[0].message.content".to_string(),
            raw: Some(response.clone()),
        })
}

/// Shared tone/audience/length instruction appended to every framing.
fn style_instruction(settings: &GenerationSettings) -> String {
    format!(
        "Write in a {} tone for a {} audience, in the language {}. Aim for about {} words.",
        settings.tone, settings.target_audience, settings.language, settings.length
    )
}

/// Long-form blog article generator.
pub struct BlogPostGenerator {
    gateway: Arc<Gateway>,
    model: String,
}

impl BlogPostGenerator {
    pub fn new(gateway: Arc<Gateway>, model: String) -> Self {
        Self { gateway, model }
    }
}

#[async_trait]
impl Generator for BlogPostGenerator {
    fn content_type(&self) -> &str {
        "blog_post"
    }

    fn description(&self) -> &str {
        "Long-form blog article with headings and optional SEO metadata"
    }

    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<GenerationOutput> {
        let system = format!(
            "You are a professional content writer. Write a complete blog post with \
             markdown headings, an engaging introduction, and a conclusion. {}",
            style_instruction(settings)
        );

        let (raw, mut meta) = chat(&self.gateway, &self.model, &system, prompt, settings).await?;
        let html = content::format_content(&raw);

        if settings.include_seo {
            let seo = content::generate_seo_meta(&html, "");
            meta.insert("seo".to_string(), serde_json::to_value(&seo)?);
        }
        let headings = content::extract_headings(&html);
        if !headings.is_empty() {
            meta.insert("headings".to_string(), serde_json::to_value(&headings)?);
        }
        if let Some(image) = content::first_image(&html) {
            meta.insert("featured_image".to_string(), json!(image));
        }

        Ok(GenerationOutput::with_meta(html, meta))
    }
}

/// Product description generator.
pub struct ProductDescriptionGenerator {
    gateway: Arc<Gateway>,
    model: String,
}

impl ProductDescriptionGenerator {
    pub fn new(gateway: Arc<Gateway>, model: String) -> Self {
        Self { gateway, model }
    }
}

#[async_trait]
impl Generator for ProductDescriptionGenerator {
    fn content_type(&self) -> &str {
        "product_description"
    }

    fn description(&self) -> &str {
        "Persuasive product copy highlighting benefits and features"
    }

    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<GenerationOutput> {
        let system = format!(
            "You are an e-commerce copywriter. Write a persuasive product description \
             that highlights concrete benefits, ending with a call to action. {}",
            style_instruction(settings)
        );

        let (text, meta) = chat(&self.gateway, &self.model, &system, prompt, settings).await?;
        Ok(GenerationOutput::with_meta(text, meta))
    }
}

/// Social media post generator.
pub struct SocialMediaGenerator {
    gateway: Arc<Gateway>,
    model: String,
}

impl SocialMediaGenerator {
    pub fn new(gateway: Arc<Gateway>, model: String) -> Self {
        Self { gateway, model }
    }
}

#[async_trait]
impl Generator for SocialMediaGenerator {
    fn content_type(&self) -> &str {
        "social_media"
    }

    fn description(&self) -> &str {
        "Short promotional posts for social platforms"
    }

    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<GenerationOutput> {
        // Short-form by nature; the length setting does not apply here.
        let system = format!(
            "You are a social media manager. Write three short posts promoting the \
             given content, each under 280 characters, with relevant hashtags. \
             Write in a {} tone for a {} audience, in the language {}.",
            settings.tone, settings.target_audience, settings.language
        );

        let (text, meta) = chat(&self.gateway, &self.model, &system, prompt, settings).await?;
        Ok(GenerationOutput::with_meta(text, meta))
    }
}

/// Email newsletter generator.
pub struct NewsletterGenerator {
    gateway: Arc<Gateway>,
    model: String,
}

impl NewsletterGenerator {
    pub fn new(gateway: Arc<Gateway>, model: String) -> Self {
        Self { gateway, model }
    }
}

#[async_trait]
impl Generator for NewsletterGenerator {
    fn content_type(&self) -> &str {
        "email_newsletter"
    }

    fn description(&self) -> &str {
        "Email newsletter with subject line and sections"
    }

    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<GenerationOutput> {
        let system = format!(
            "You are an email marketer. Write a newsletter with a compelling subject \
             line on the first line, a greeting, short scannable sections, and a \
             sign-off. {}",
            style_instruction(settings)
        );

        let (text, mut meta) = chat(&self.gateway, &self.model, &system, prompt, settings).await?;

        // First line doubles as the subject.
        if let Some(subject) = text.lines().next() {
            meta.insert(
                "subject".to_string(),
                json!(subject.trim_start_matches('#').trim()),
            );
        }

        Ok(GenerationOutput::with_meta(text, meta))
    }
}

/// Landing page copy generator.
pub struct LandingPageGenerator {
    gateway: Arc<Gateway>,
    model: String,
}

impl LandingPageGenerator {
    pub fn new(gateway: Arc<Gateway>, model: String) -> Self {
        Self { gateway, model }
    }
}

#[async_trait]
impl Generator for LandingPageGenerator {
    fn content_type(&self) -> &str {
        "landing_page"
    }

    fn description(&self) -> &str {
        "Section-structured landing page copy"
    }

    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<GenerationOutput> {
        let system = format!(
            "You are a conversion copywriter. Write landing page copy with a hero \
             headline, a subheadline, three benefit sections with markdown headings, \
             and a closing call to action. {}",
            style_instruction(settings)
        );

        let (raw, meta) = chat(&self.gateway, &self.model, &system, prompt, settings).await?;
        Ok(GenerationOutput::with_meta(content::format_content(&raw), meta))
    }
}
