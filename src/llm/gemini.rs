//! Gemini API client
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::CollaborationError;
use crate::llm::{GeneratedText, TextGenerator};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_URL.to_string(),
        })
    }

    /// Raw generation call; errors are mapped to `None` by the trait impl.
    pub async fn generate_text(&self, instructions: &str, prompt: &str) -> Result<(String, f64)> {
        if self.api_key.is_empty() {
            return Err(CollaborationError::Generation(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: instructions.to_string(),
                }],
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CollaborationError::Generation(format!(
                "Gemini returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            CollaborationError::Generation(format!("Gemini parse error: {}", e))
        })?;

        let answer = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| CollaborationError::Generation("Empty response from Gemini".to_string()))?;

        let confidence = calculate_confidence(&gemini_response);
        debug!(confidence = confidence, chars = answer.len(), "Gemini response received");

        Ok((answer, confidence))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, instructions: &str, prompt: &str) -> Option<GeneratedText> {
        match self.generate_text(instructions, prompt).await {
            Ok((text, confidence)) => Some(GeneratedText { text, confidence }),
            Err(e) => {
                warn!(error = %e, "Gemini generation failed");
                None
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

/// Confidence from finish reason and answer length.
fn calculate_confidence(response: &GeminiResponse) -> f64 {
    let Some(candidate) = response.candidates.first() else {
        return 0.0;
    };

    let finish_confidence = match candidate.finish_reason.as_deref() {
        Some("STOP") => 1.0,
        Some("MAX_TOKENS") => 0.8,
        Some("SAFETY") => 0.6,
        _ => 0.7,
    };

    let response_length = candidate
        .content
        .parts
        .first()
        .map(|p| p.text.len())
        .unwrap_or(0);

    let length_confidence: f64 = if response_length < 50 {
        0.6
    } else if response_length > 4000 {
        0.8
    } else {
        1.0
    };

    (0.85_f64 * finish_confidence * length_confidence).clamp(0.5, 0.98)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_camel_case() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "How can I save more?".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: "You are the cash flow analyst".to_string(),
                }],
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("generationConfig"));
        assert!(json.contains("maxOutputTokens"));
        assert!(json.contains("How can I save more?"));
    }

    #[test]
    fn test_confidence_from_response() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"short"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        let confidence = calculate_confidence(&response);
        assert!((confidence - 0.51).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_key_fails_without_network() {
        let client = GeminiClient::new(String::new()).unwrap();
        assert!(client.generate("instructions", "prompt").await.is_none());
    }
}
