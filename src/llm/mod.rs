//! Text-generation seam
//!
//! Generation is advisory: every failure surfaces as `None` and callers
//! take their templated fallback path.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub mod gemini;
pub use gemini::GeminiClient;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedText {
    pub text: String,
    /// 0-1
    pub confidence: f64,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, instructions: &str, prompt: &str) -> Option<GeneratedText>;
}

/// Generator used when no model is configured.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn generate(&self, _instructions: &str, _prompt: &str) -> Option<GeneratedText> {
        None
    }
}

/// Canned responses selected by a marker found in the instructions.
/// Keeps the pipeline testable without a model.
pub struct ScriptedGenerator {
    responses: Vec<(String, String)>,
    confidence: f64,
}

impl ScriptedGenerator {
    /// Same text for every prompt.
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            responses: vec![(String::new(), text.into())],
            confidence: 0.85,
        }
    }

    pub fn keyed(responses: Vec<(&str, &str)>) -> Self {
        Self {
            responses: responses
                .into_iter()
                .map(|(marker, text)| (marker.to_string(), text.to_string()))
                .collect(),
            confidence: 0.85,
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, instructions: &str, _prompt: &str) -> Option<GeneratedText> {
        self.responses
            .iter()
            .find(|(marker, _)| instructions.contains(marker.as_str()))
            .map(|(_, text)| GeneratedText {
                text: text.clone(),
                confidence: self.confidence,
            })
    }
}

/// Gemini when an API key is configured, otherwise the disabled generator.
pub fn build_generator(api_key: Option<&str>) -> Arc<dyn TextGenerator> {
    if let Some(key) = api_key {
        match GeminiClient::new(key.to_string()) {
            Ok(client) => {
                info!("Text generator: gemini");
                return Arc::new(client);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build Gemini client, generation disabled");
            }
        }
    }

    info!("Text generator: disabled (templated fallbacks only)");
    Arc::new(DisabledGenerator)
}
