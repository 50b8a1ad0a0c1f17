//! Generation client.
//!
//! Sends a fully composed prompt to a local language model and returns the raw
//! text. The client adds no system prompt and does no post-processing.
//! Failures are not retried; a request exceeding the configured timeout is
//! reported as [`RagError::GenerationTimedOut`], distinct from other backend
//! failures.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};

/// Turns a prompt into text using the named model.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Generator backed by a local Ollama runtime (`/api/generate`).
pub struct OllamaGenerator {
    url: String,
    timeout_secs: u64,
    temperature: Option<f32>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::generation(e.to_string()))?;

        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
            client,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.url)
    }

    /// Names of the models installed in the runtime.
    pub async fn installed_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| RagError::generation(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RagError::generation(format!("HTTP {}", response.status())));
        }

        let tags: OllamaTagsResponse = response
            .json()
            .await
            .map_err(|e| RagError::generation(format!("invalid response: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn map_send_error(&self, err: reqwest::Error) -> RagError {
        if err.is_timeout() {
            RagError::GenerationTimedOut {
                secs: self.timeout_secs,
            }
        } else {
            RagError::generation(err.to_string())
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let request = OllamaGenerateRequest {
            model,
            prompt,
            stream: false,
            options: self.temperature.map(|temperature| OllamaOptions { temperature }),
        };

        tracing::debug!(model, prompt_chars = prompt.len(), "sending generation request");

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "ollama generation error");
            if status.as_u16() == 404 {
                return Err(RagError::generation(format!("model not found: {}", model)));
            }
            return Err(RagError::generation(format!("HTTP {}: {}", status, body)));
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| self.map_send_error(e))?;

        tracing::debug!(
            model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            eval_count = parsed.eval_count,
            "generation complete"
        );

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let config = GenerationConfig {
            url: "http://127.0.0.1:11434/".to_string(),
            ..GenerationConfig::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        assert_eq!(generator.generate_url(), "http://127.0.0.1:11434/api/generate");
        assert_eq!(generator.tags_url(), "http://127.0.0.1:11434/api/tags");
    }

    #[test]
    fn test_request_omits_unset_options() {
        let request = OllamaGenerateRequest {
            model: "qwen2.5:0.5b",
            prompt: "p",
            stream: false,
            options: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert!(json.get("options").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_service_unavailable() {
        // Port 9 (discard) is not an HTTP server on test hosts.
        let config = GenerationConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..GenerationConfig::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        let err = generator.generate("qwen2.5:0.5b", "hi").await.unwrap_err();
        assert!(matches!(
            err,
            RagError::ServiceUnavailable { .. } | RagError::GenerationTimedOut { .. }
        ));
    }

    #[tokio::test]
    async fn test_silent_backend_times_out() {
        // Accepts the connection and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = GenerationConfig {
            url: format!("http://{}", addr),
            timeout_secs: 1,
            ..GenerationConfig::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        let err = generator.generate("qwen2.5:0.5b", "hi").await.unwrap_err();
        assert!(
            matches!(err, RagError::GenerationTimedOut { secs: 1 }),
            "got {:?}",
            err
        );
    }
}
