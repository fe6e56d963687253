//! Media generators - image, voice, and video content types.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::types::{GenerationOutput, Generator};
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::providers::{payloads, Capability};
use crate::settings::GenerationSettings;

fn shape_error(message: &str, raw: &Value) -> Error {
    Error::Api {
        status: 200,
        message: message.to_string(),
        raw: Some(raw.clone()),
    }
}

/// Image generator backed by the configured image provider.
pub struct ImageGenerator {
    gateway: Arc<Gateway>,
    provider: String,
}

impl ImageGenerator {
    pub fn new(gateway: Arc<Gateway>, provider: String) -> Self {
        Self { gateway, provider }
    }
}

#[async_trait]
impl Generator for ImageGenerator {
    fn content_type(&self) -> &str {
        "image"
    }

    fn description(&self) -> &str {
        "Image generation from a text prompt"
    }

    async fn generate(
        &self,
        prompt: &str,
        _settings: &GenerationSettings,
    ) -> Result<GenerationOutput> {
        let payload = if self.provider == "openai" {
            payloads::openai_image_payload(prompt)
        } else {
            payloads::stability_image_payload(prompt)
        };

        let response = self
            .gateway
            .request(&self.provider, Capability::Image, payload, None)
            .await?;

        let mut meta = Map::new();
        meta.insert("provider".to_string(), json!(self.provider));

        // OpenAI returns a URL; Stability returns base64 artifacts.
        let content = if self.provider == "openai" {
            response
                .pointer("/data/0/url")
                .or_else(|| response.pointer("/data/0/b64_json"))
                .and_then(|v| v.as_str())
                .map(String::from)
                .ok_or_else(|| shape_error("Response is missing image data", &response))?
        } else {
            if let Some(seed) = response.pointer("/artifacts/0/seed") {
                meta.insert("seed".to_string(), seed.clone());
            }
            response
                .pointer("/artifacts/0/base64")
                .and_then(|v| v.as_str())
                .map(String::from)
                .ok_or_else(|| shape_error("Response is missing image artifacts", &response))?
        };

        Ok(GenerationOutput::with_meta(content, meta))
    }
}

/// Voice generator backed by ElevenLabs text-to-speech.
pub struct VoiceGenerator {
    gateway: Arc<Gateway>,
}

impl VoiceGenerator {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Generator for VoiceGenerator {
    fn content_type(&self) -> &str {
        "voice"
    }

    fn description(&self) -> &str {
        "Voiceover audio from text"
    }

    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<GenerationOutput> {
        let payload = payloads::voice_payload(prompt, settings);
        let response = self
            .gateway
            .request("elevenlabs", Capability::Voice, payload, None)
            .await?;

        let content = response
            .get("audio_base64")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| shape_error("Response is missing audio data", &response))?;

        let mut meta = Map::new();
        meta.insert("provider".to_string(), json!("elevenlabs"));
        meta.insert("characters".to_string(), json!(prompt.chars().count()));

        Ok(GenerationOutput::with_meta(content, meta))
    }
}

/// Video generator backed by Synthesia.
pub struct VideoGenerator {
    gateway: Arc<Gateway>,
    avatar: String,
}

impl VideoGenerator {
    pub fn new(gateway: Arc<Gateway>, avatar: String) -> Self {
        Self { gateway, avatar }
    }
}

#[async_trait]
impl Generator for VideoGenerator {
    fn content_type(&self) -> &str {
        "video"
    }

    fn description(&self) -> &str {
        "Avatar video rendered from a script"
    }

    async fn generate(
        &self,
        prompt: &str,
        _settings: &GenerationSettings,
    ) -> Result<GenerationOutput> {
        let payload = payloads::video_payload(prompt, &self.avatar);
        let response = self
            .gateway
            .request("synthesia", Capability::Video, payload, None)
            .await?;

        // Video rendering is asynchronous on the provider side: the
        // immediate response carries the video id, and a download URL
        // once rendering finished.
        let content = response
            .get("download")
            .or_else(|| response.get("id"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| shape_error("Response is missing video id", &response))?;

        let mut meta = Map::new();
        meta.insert("provider".to_string(), json!("synthesia"));
        if let Some(id) = response.get("id") {
            meta.insert("video_id".to_string(), id.clone());
        }
        if let Some(status) = response.get("status") {
            meta.insert("render_status".to_string(), status.clone());
        }

        Ok(GenerationOutput::with_meta(content, meta))
    }
}
