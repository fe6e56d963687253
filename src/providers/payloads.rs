//! Request payload builders.
//!
//! Each provider expects a different JSON body shape. The builders here are
//! the single place those shapes live; the gateway and generators never
//! hand-assemble provider-specific JSON anywhere else.

use serde_json::{json, Value};

use super::types::Capability;
use crate::settings::GenerationSettings;

/// Build the minimal payload used by connection tests.
pub fn test_payload(provider: &str, capability: Capability, prompt: &str) -> Value {
    match provider {
        "openai" => match capability {
            Capability::Text => json!({
                "model": "gpt-3.5-turbo-instruct",
                "prompt": prompt,
                "max_tokens": 10,
                "temperature": 0,
            }),
            Capability::Chat => json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": 10,
                "temperature": 0,
            }),
            _ => json!({
                "prompt": prompt,
                "n": 1,
                "size": "256x256",
            }),
        },
        "stabilityai" => json!({
            "text_prompts": [{"text": prompt}],
            "cfg_scale": 7,
            "height": 64,
            "width": 64,
            "samples": 1,
            "steps": 20,
        }),
        "elevenlabs" => json!({
            "text": prompt,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.5,
            },
        }),
        "synthesia" => json!({
            "test": true,
            "input": prompt,
        }),
        _ => json!({ "prompt": prompt }),
    }
}

/// Build an OpenAI chat-completion payload.
///
/// `system` frames the content type; the user message is the interpolated
/// prompt. Temperature tracks the creativity setting and the token budget
/// scales with the target word length.
pub fn chat_payload(
    model: &str,
    system: &str,
    prompt: &str,
    settings: &GenerationSettings,
) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": prompt},
        ],
        "max_tokens": max_tokens_for_length(settings.length),
        "temperature": settings.creativity,
    })
}

/// Build a Stability AI text-to-image payload.
pub fn stability_image_payload(prompt: &str) -> Value {
    json!({
        "text_prompts": [{"text": prompt}],
        "cfg_scale": 7,
        "height": 1024,
        "width": 1024,
        "samples": 1,
        "steps": 30,
    })
}

/// Build an OpenAI image-generation payload.
pub fn openai_image_payload(prompt: &str) -> Value {
    json!({
        "prompt": prompt,
        "n": 1,
        "size": "1024x1024",
    })
}

/// Build an ElevenLabs text-to-speech payload.
pub fn voice_payload(text: &str, settings: &GenerationSettings) -> Value {
    json!({
        "text": text,
        "voice_settings": {
            // Map creativity onto voice variability: higher creativity,
            // less stability.
            "stability": (1.0 - settings.creativity).max(0.0),
            "similarity_boost": 0.5,
        },
    })
}

/// Build a Synthesia video-creation payload.
pub fn video_payload(script: &str, avatar: &str) -> Value {
    json!({
        "input": [{
            "scriptText": script,
            "avatar": avatar,
        }],
        "test": false,
    })
}

/// Rough token budget for a target word length.
///
/// English prose runs a bit over one token per word; doubling leaves
/// headroom for markup and lists without letting tiny lengths starve the
/// completion.
fn max_tokens_for_length(length: u32) -> u32 {
    (length * 2).clamp(256, 4096)
}
