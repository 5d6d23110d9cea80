//! Remote configuration documents served by the WALL-E backend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `GET /api/config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub prompt: PromptsConfig,
}

impl AppConfig {
    /// Resolve a model id, falling back to the configured default.
    pub fn resolve_model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(m) if !m.trim().is_empty() => m,
            _ => &self.models.default_model,
        }
    }

    /// `max_tokens` declared for a model, if known.
    pub fn max_tokens_for(&self, model: &str) -> Option<u32> {
        self.models
            .available_models
            .get(model)
            .and_then(|m| m.max_tokens)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub available_models: BTreeMap<String, ModelInfo>,
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let mut available_models = BTreeMap::new();
        available_models.insert(
            default_model(),
            ModelInfo {
                name: "GPT-4o Mini".to_string(),
                description: Some("OpenAI GPT-4o Mini - Efficient".to_string()),
                provider: Some("openai".to_string()),
                max_tokens: Some(8000),
            },
        );
        Self {
            available_models,
            default_model: default_model(),
        }
    }
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub welcome_message: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are WALL•E, a helpful AI assistant.".to_string(),
            welcome_message: "Hello! I'm WALL•E. How can I help?".to_string(),
        }
    }
}

/// `GET /api`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub encryption: Option<String>,
}
