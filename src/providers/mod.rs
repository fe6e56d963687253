//! Provider catalog - the supported generative AI services.

mod catalog;
pub mod payloads;
mod types;

pub use catalog::ProviderRegistry;
pub use types::{AuthScheme, Capability, Provider, ProviderLimits};
