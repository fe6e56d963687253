//! Provider descriptor types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Operation category a provider can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Text,
    Chat,
    Image,
    Voice,
    Video,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Chat => write!(f, "chat"),
            Self::Image => write!(f, "image"),
            Self::Voice => write!(f, "voice"),
            Self::Video => write!(f, "video"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "chat" => Ok(Self::Chat),
            "image" => Ok(Self::Image),
            "voice" => Ok(Self::Voice),
            "video" => Ok(Self::Video),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}

/// How a provider expects its API key in request headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `Authorization: <key>` (no scheme prefix)
    Raw,
    /// Custom header name, e.g. `xi-api-key: <key>`
    Header(String),
}

/// Default rate-limit budget for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLimits {
    /// Maximum calls per window
    pub requests_per_window: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

/// A registered generative AI provider.
///
/// Immutable after registration; looked up by name. Endpoint URLs may
/// contain `{param}` path segments that are resolved from `path_params`
/// before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Catalog key, e.g. "openai"
    pub name: String,
    /// Human-readable name, e.g. "OpenAI"
    pub display_name: String,
    /// Endpoint URL template per capability
    pub endpoints: HashMap<Capability, String>,
    /// Auth header shape
    pub auth: AuthScheme,
    /// Prompt used by connection tests
    pub test_prompt: String,
    /// Default values for `{param}` path segments in endpoint templates
    pub path_params: HashMap<String, String>,
    /// Default local rate-limit budget
    pub limits: ProviderLimits,
}

impl Provider {
    /// Resolve the endpoint URL for a capability, substituting path params.
    ///
    /// Returns `None` when the provider does not support the capability.
    pub fn endpoint(&self, capability: Capability) -> Option<String> {
        let template = self.endpoints.get(&capability)?;
        let mut url = template.clone();
        for (param, value) in &self.path_params {
            url = url.replace(&format!("{{{}}}", param), value);
        }
        Some(url)
    }

    /// Capabilities this provider supports.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self.endpoints.keys().copied().collect();
        caps.sort_by_key(|c| c.to_string());
        caps
    }
}
