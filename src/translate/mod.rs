// Text translation providers and the per-segment translation pass
//
// - openai: OpenAI chat completions
// - ollama: local Ollama server
// - segments: translates a transcript one segment at a time under a rate limit

pub mod common;
pub mod ollama;
pub mod openai;
pub mod segments;

use async_trait::async_trait;
use std::sync::Arc;

pub use common::*;
pub use segments::SegmentTranslator;

use crate::config::{TranslateConfig, TranslationProvider};
use crate::error::Result;

/// A service that translates one piece of text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextTranslator: Send + Sync {
    /// Translate text into the language named by `target_language`
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;

    /// Check that the service is reachable and usable
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating translators
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: &TranslateConfig) -> Result<Arc<dyn TextTranslator>> {
        let translator: Arc<dyn TextTranslator> = match config.provider {
            TranslationProvider::OpenAi => Arc::new(openai::OpenAiTranslator::new(config)?),
            TranslationProvider::Ollama => Arc::new(ollama::OllamaTranslator::new(config)?),
        };
        Ok(translator)
    }
}
