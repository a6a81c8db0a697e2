//! Google Gemini `generateContent` backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{build_http_client, endpoint, CompletionBackend, CompletionRequest};
use crate::config::BackendConfig;
use crate::error::mapping::map_http_error;
use crate::error::{ClassifierError, Result};

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Backend speaking the Gemini `models/{model}:generateContent` protocol
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiBackend {
    /// Create a backend from configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(config.timeout())?,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let model = request.model.trim_start_matches("models/");
        let url = endpoint(&self.base_url, &format!("models/{}:generateContent", model));

        let body = GenerateContentRequest {
            system_instruction: request.system.as_deref().map(|system| Content {
                role: None,
                parts: vec![Part { text: system }],
            }),
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        log::debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(map_http_error(status, &text));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .ok_or_else(|| ClassifierError::format("No candidates returned"))?;

        let answer: String = candidate
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if answer.is_empty() {
            return Err(ClassifierError::format("Candidate contained no text"));
        }
        Ok(answer)
    }
}
