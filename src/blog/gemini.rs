use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerationRequest, TextGenerator};
use crate::config::GenerationConfig;
use crate::{PipelineError, Result};

/// Google Gemini `generateContent` client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PipelineError::Config("GEMINI_API_KEY is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Concatenated text parts of the first candidate
    fn parse_response(body: &str) -> Result<String> {
        let parsed: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
            PipelineError::GenerationFailed(format!("Failed to parse Gemini response: {}", e))
        })?;

        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, request.model);
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart {
                    text: &request.prompt,
                }],
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::GenerationFailed(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PipelineError::GenerationFailed(format!("Failed to read Gemini response: {}", e)))?;

        if !status.is_success() {
            return Err(PipelineError::GenerationFailed(format!(
                "Gemini returned HTTP {}: {}",
                status,
                text.trim()
            )));
        }

        Self::parse_response(&text)
    }
}
