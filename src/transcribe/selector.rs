use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::{BackendOutcome, LoadedModel, TranscribeOptions, TranscriptionBackend};
use crate::error::{Result, VidsubError};
use crate::transcript::Transcription;

/// Record of the one allowed step down to the smaller model.
#[derive(Debug, Clone, PartialEq)]
pub struct Downgrade {
    pub from: String,
    pub to: String,
    pub reason: String,
}

/// A loaded model plus the downgrade, if any, it took to get it.
pub struct PreparedBackend {
    model: Box<dyn LoadedModel>,
    downgrade: Option<Downgrade>,
}

impl PreparedBackend {
    pub fn model(&self) -> &str {
        self.model.model()
    }

    pub fn downgrade(&self) -> Option<&Downgrade> {
        self.downgrade.as_ref()
    }
}

/// Transcription produced by the selector.
#[derive(Debug, Clone)]
pub struct Selection {
    pub transcription: Transcription,
    /// Model that produced the transcription
    pub model: String,
    pub downgrade: Option<Downgrade>,
}

/// Runs the preferred model and steps down to the fallback at most once.
///
/// Only resource exhaustion triggers the step down, whether it shows up while
/// loading or while transcribing. Any other failure is returned untouched.
pub struct BackendSelector {
    backend: Arc<dyn TranscriptionBackend>,
    preferred: String,
    fallback: Option<String>,
}

impl BackendSelector {
    pub fn new(backend: Arc<dyn TranscriptionBackend>, preferred: String, fallback: Option<String>) -> Self {
        Self {
            backend,
            preferred,
            fallback,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn preferred(&self) -> &str {
        &self.preferred
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// Load the preferred model, or the fallback if the preferred one does not fit.
    pub async fn prepare(&self) -> Result<PreparedBackend> {
        info!("Loading {} model '{}'", self.backend.name(), self.preferred);

        match self.backend.load(&self.preferred).await {
            BackendOutcome::Ready(model) => Ok(PreparedBackend { model, downgrade: None }),
            BackendOutcome::ResourceExhausted(detail) => {
                let (model, downgrade) = self.downgrade(detail).await?;
                Ok(PreparedBackend {
                    model,
                    downgrade: Some(downgrade),
                })
            }
            BackendOutcome::Failed(e) => Err(e),
        }
    }

    /// Transcribe with the prepared model, downgrading if it has not happened yet.
    pub async fn transcribe(
        &self,
        prepared: PreparedBackend,
        audio_path: &Path,
        options: &TranscribeOptions,
    ) -> Result<Selection> {
        let PreparedBackend { model, downgrade } = prepared;
        let model_name = model.model().to_string();

        let outcome = model.transcribe(audio_path, options).await;
        match outcome {
            BackendOutcome::Ready(transcription) => Ok(Selection {
                transcription,
                model: model_name,
                downgrade,
            }),
            BackendOutcome::ResourceExhausted(detail) if downgrade.is_none() => {
                // Release the large model before loading the small one
                drop(model);
                let (fallback_model, downgrade) = self.downgrade(detail).await?;
                let fallback_name = fallback_model.model().to_string();

                match fallback_model.transcribe(audio_path, options).await {
                    BackendOutcome::Ready(transcription) => Ok(Selection {
                        transcription,
                        model: fallback_name,
                        downgrade: Some(downgrade),
                    }),
                    BackendOutcome::ResourceExhausted(detail) => Err(VidsubError::ResourceExhausted {
                        model: fallback_name,
                        detail,
                    }),
                    BackendOutcome::Failed(e) => Err(e),
                }
            }
            BackendOutcome::ResourceExhausted(detail) => Err(VidsubError::ResourceExhausted {
                model: model_name,
                detail,
            }),
            BackendOutcome::Failed(e) => Err(e),
        }
    }

    /// Prepare and transcribe in one call.
    pub async fn run(&self, audio_path: &Path, options: &TranscribeOptions) -> Result<Selection> {
        let prepared = self.prepare().await?;
        self.transcribe(prepared, audio_path, options).await
    }

    async fn downgrade(&self, detail: String) -> Result<(Box<dyn LoadedModel>, Downgrade)> {
        let Some(fallback) = &self.fallback else {
            return Err(VidsubError::ResourceExhausted {
                model: self.preferred.clone(),
                detail,
            });
        };

        warn!(
            from = %self.preferred,
            to = %fallback,
            reason = %detail,
            "Not enough memory for model '{}', downgrading to '{}'",
            self.preferred,
            fallback
        );

        match self.backend.load(fallback).await {
            BackendOutcome::Ready(model) => Ok((
                model,
                Downgrade {
                    from: self.preferred.clone(),
                    to: fallback.clone(),
                    reason: detail,
                },
            )),
            BackendOutcome::ResourceExhausted(detail) => Err(VidsubError::ResourceExhausted {
                model: fallback.clone(),
                detail,
            }),
            BackendOutcome::Failed(e) => Err(e),
        }
    }
}
