// Remote backend: OpenAI audio transcription/translation endpoints

use async_trait::async_trait;
use reqwest::{Client, StatusCode, multipart};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::{BackendOutcome, LoadedModel, Task, TranscribeOptions, TranscriptionBackend, common::WhisperJsonOutput};
use crate::config::TranscriberConfig;
use crate::error::{Result, VidsubError};
use crate::transcript::Transcription;

pub struct OpenAiAudioBackend {
    endpoint: String,
    api_key_env: String,
}

impl OpenAiAudioBackend {
    pub fn new(config: &TranscriberConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for OpenAiAudioBackend {
    fn name(&self) -> &str {
        "openai-audio"
    }

    async fn load(&self, model: &str) -> BackendOutcome<Box<dyn LoadedModel>> {
        let api_key = match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                return BackendOutcome::Failed(VidsubError::Config(format!(
                    "The {} environment variable is not set",
                    self.api_key_env
                )));
            }
        };

        let client = match Client::builder().timeout(Duration::from_secs(600)).build() {
            Ok(client) => client,
            Err(e) => return BackendOutcome::Failed(VidsubError::Http(e)),
        };

        BackendOutcome::Ready(Box::new(OpenAiAudioModel {
            client,
            endpoint: self.endpoint.clone(),
            api_key,
            model: model.to_string(),
        }))
    }
}

pub struct OpenAiAudioModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiAudioModel {
    fn url_for(&self, task: Task) -> String {
        match task {
            Task::Transcribe => format!("{}/audio/transcriptions", self.endpoint),
            Task::Translate => format!("{}/audio/translations", self.endpoint),
        }
    }

    async fn run(&self, audio_path: &Path, options: &TranscribeOptions) -> Result<Transcription> {
        options.validate()?;
        let audio = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let file_part = multipart::Part::bytes(audio)
            .file_name(file_name)
            .mime_str("audio/wav")?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);

        // The translations endpoint always produces English and takes no language
        if let (Task::Transcribe, Some(lang)) = (options.task, &options.language) {
            form = form.text("language", lang.clone());
        }

        let url = self.url_for(options.task);
        debug!(model = %self.model, "Sending audio to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VidsubError::Transcription(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(&self.model, status, body));
        }

        let output: WhisperJsonOutput = response
            .json()
            .await
            .map_err(|e| VidsubError::Transcription(format!("Failed to parse response: {}", e)))?;

        info!(segments = output.segments.len(), "OpenAI transcription completed");
        Ok(output.into())
    }
}

/// 413 and 507 mean the request does not fit the service's capacity
fn classify_failure(model: &str, status: StatusCode, body: String) -> VidsubError {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE | StatusCode::INSUFFICIENT_STORAGE => VidsubError::ResourceExhausted {
            model: model.to_string(),
            detail: format!("status {}: {}", status, body),
        },
        _ => VidsubError::Transcription(format!("OpenAI API error {}: {}", status, body)),
    }
}

#[async_trait]
impl LoadedModel for OpenAiAudioModel {
    fn model(&self) -> &str {
        &self.model
    }

    async fn transcribe(&self, audio_path: &Path, options: &TranscribeOptions) -> BackendOutcome<Transcription> {
        info!(model = %self.model, "Uploading {} for transcription", audio_path.display());
        self.run(audio_path, options).await.into()
    }
}
