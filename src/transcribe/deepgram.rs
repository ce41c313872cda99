use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{SpeechAlternative, SpeechRequest, SpeechResponse, SpeechToText, SpeechWord};
use crate::config::SpeechConfig;
use crate::{PipelineError, Result};

/// Deepgram pre-recorded transcription client
pub struct DeepgramClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    smart_format: bool,
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
struct Word {
    #[serde(default)]
    word: String,
    punctuated_word: Option<String>,
    language: Option<String>,
}

impl DeepgramClient {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PipelineError::Config("DEEPGRAM_API_KEY is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            smart_format: config.smart_format,
        })
    }

    fn parse_response(body: &str) -> Result<SpeechResponse> {
        let parsed: ListenResponse = serde_json::from_str(body).map_err(|e| {
            PipelineError::TranscriptionFailed(format!("Failed to parse Deepgram response: {}", e))
        })?;

        let alternatives = parsed
            .results
            .and_then(|results| results.channels.into_iter().next())
            .map(|channel| channel.alternatives)
            .unwrap_or_default()
            .into_iter()
            .map(|alt| SpeechAlternative {
                transcript: alt.transcript,
                words: alt
                    .words
                    .into_iter()
                    .map(|w| SpeechWord {
                        text: w.punctuated_word.unwrap_or(w.word),
                        language: w.language,
                    })
                    .collect(),
            })
            .collect();

        Ok(SpeechResponse { alternatives })
    }
}

/// Map a reqwest failure onto the retry taxonomy
fn classify_request_error(err: reqwest::Error) -> PipelineError {
    let message = error_chain(&err);
    if err.is_timeout() || err.is_connect() {
        PipelineError::TransientNetwork(message)
    } else {
        PipelineError::TranscriptionFailed(format!("Deepgram request failed: {}", message))
    }
}

/// Error message including every `source()` in the chain
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl SpeechToText for DeepgramClient {
    async fn transcribe(&self, request: SpeechRequest) -> Result<SpeechResponse> {
        let smart_format = if self.smart_format { "true" } else { "false" };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("model", self.model.as_str()),
                ("language", request.language.as_query_value()),
                ("smart_format", smart_format),
            ])
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.api_key))
            .header(reqwest::header::CONTENT_TYPE, request.mime_type.as_str())
            .body(request.audio)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_request_error)?;

        if !status.is_success() {
            return Err(PipelineError::TranscriptionFailed(format!(
                "Deepgram returned HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        Self::parse_response(&body)
    }
}
