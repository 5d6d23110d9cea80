//! Client configuration.
//!
//! Two layers: [`ClientConfig`] is local (base URL, credentials, HTTP knobs)
//! and built from the environment or a builder; [`AppConfig`] is the remote
//! document served by `GET /api/config` (available models and prompts).

pub mod client;
pub mod remote;

pub use client::{ClientConfig, ClientConfigBuilder};
pub use remote::{ApiStatus, AppConfig, ModelInfo, ModelsConfig, PromptsConfig};
