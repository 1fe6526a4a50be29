use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{TextTranslator, common::clean_translation_response};
use crate::config::TranslateConfig;
use crate::error::{Result, VidsubError};

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Translator backed by OpenAI chat completions.
pub struct OpenAiTranslator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                VidsubError::Config(format!(
                    "The {} environment variable is not set",
                    config.api_key_env
                ))
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint().trim_end_matches('/').to_string(),
            model: config.model().to_string(),
            api_key,
        })
    }

    fn build_request(&self, text: &str, target_language: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: format!("Translate the following text to {}.", target_language),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
        }
    }
}

fn extract_translation(response: ChatResponse) -> Result<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .map(|choice| clean_translation_response(&choice.message.content))
        .unwrap_or_default();

    if content.is_empty() {
        return Err(VidsubError::Translation("Empty translation received".to_string()));
    }
    Ok(content)
}

#[async_trait]
impl TextTranslator for OpenAiTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Sending translation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(text, target_language))
            .send()
            .await
            .map_err(|e| VidsubError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(VidsubError::Translation(format!(
                "OpenAI API error {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| VidsubError::Translation(format!("Failed to parse response: {}", e)))?;

        extract_translation(chat)
    }

    /// Lists models to validate the API key without spending a completion
    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/models", self.endpoint);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| VidsubError::Translation(format!("Failed to connect to OpenAI: {}", e)))?;

        if response.status().is_success() {
            info!("OpenAI API key is valid");
            Ok(())
        } else {
            Err(VidsubError::Translation(format!(
                "OpenAI API key validation failed: HTTP {}",
                response.status()
            )))
        }
    }
}
