use async_trait::async_trait;
use std::sync::Arc;

pub mod gemini;

use crate::{PipelineError, Result};

pub use gemini::GeminiClient;

/// Request sent to a generative-text service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
}

/// A generative-text backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String>;
}

/// Languages with a dedicated SEO prompt template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlogLanguage {
    #[default]
    English,
    Hindi,
    Telugu,
    Tamil,
}

impl BlogLanguage {
    pub const ALL: [BlogLanguage; 4] = [
        BlogLanguage::English,
        BlogLanguage::Hindi,
        BlogLanguage::Telugu,
        BlogLanguage::Tamil,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" => Some(BlogLanguage::English),
            "hi" => Some(BlogLanguage::Hindi),
            "te" => Some(BlogLanguage::Telugu),
            "ta" => Some(BlogLanguage::Tamil),
            _ => None,
        }
    }

    /// Unrecognized codes fall back to English instead of failing
    pub fn resolve(code: &str) -> Self {
        Self::from_code(code).unwrap_or_default()
    }

    pub fn code(&self) -> &'static str {
        match self {
            BlogLanguage::English => "en",
            BlogLanguage::Hindi => "hi",
            BlogLanguage::Telugu => "te",
            BlogLanguage::Tamil => "ta",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BlogLanguage::English => "English",
            BlogLanguage::Hindi => "Hindi",
            BlogLanguage::Telugu => "Telugu",
            BlogLanguage::Tamil => "Tamil",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            BlogLanguage::English => "You are an expert SEO content writer. Given a transcript from a video, write a complete, long-form SEO blog article in English.",
            BlogLanguage::Hindi => "Aap ek visheshagya SEO content lekhak hain. Ek video ke transcript ko dekhte hue, ek purn, dirghakaalin SEO blog lekh likhen.",
            BlogLanguage::Telugu => "Meeru oka nipuna SEO content rachayita. Oka video transcript nu icchina sampurna, sudeergha SEO blog kathanani vrayandi.",
            BlogLanguage::Tamil => "Ningal oru SEO content ezhuthalar. Oru video transcript kodupppatta, muzhu, neel SEO blog katuhai ezhutuvum.",
        }
    }

    /// Single prompt: template, instruction, transcript
    pub fn prompt(&self, transcript: &str) -> String {
        format!(
            "{}\n\nGenerate the SEO blog article from this video transcript:\n\n{}",
            self.template(),
            transcript
        )
    }
}

/// Writes a blog article from a transcript; one call, no retry
pub struct BlogGenerator {
    service: Arc<dyn TextGenerator>,
    model: String,
}

impl BlogGenerator {
    pub fn new(service: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
        }
    }

    pub async fn generate(&self, transcript: &str, language: &str) -> Result<String> {
        if transcript.trim().is_empty() {
            return Err(PipelineError::EmptyTranscript);
        }

        let blog_language = match BlogLanguage::from_code(language) {
            Some(blog_language) => blog_language,
            None => {
                tracing::warn!("No template for language '{}', using English", language);
                BlogLanguage::default()
            }
        };

        tracing::info!(
            "Generating blog in {} ({}) with {}",
            blog_language.label(),
            blog_language.code(),
            self.model
        );

        let content = self
            .service
            .generate(GenerationRequest {
                model: self.model.clone(),
                prompt: blog_language.prompt(transcript),
            })
            .await?;

        if content.trim().is_empty() {
            return Err(PipelineError::GenerationFailed(
                "generative service returned no content".to_string(),
            ));
        }

        Ok(content)
    }
}
