// Speech backends and the model selection policy
//
// A TranscriptionBackend loads a model variant by name; the LoadedModel it
// returns turns an audio file into a Transcription. Both steps report through
// BackendOutcome so that running out of memory is a value the selector can
// branch on, separate from every other failure.
//
// - whisper_cli: local `whisper` command-line tool
// - openai: OpenAI audio API
// - selector: preferred model with a single downgrade on resource exhaustion

pub mod common;
pub mod openai;
pub mod selector;
pub mod whisper_cli;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use common::*;
pub use selector::{BackendSelector, Downgrade, PreparedBackend, Selection};

use crate::config::{BackendKind, TranscriberConfig};
use crate::transcript::Transcription;

/// A speech backend able to load model variants
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Initialize the named model variant
    async fn load(&self, model: &str) -> BackendOutcome<Box<dyn LoadedModel>>;
}

/// A model variant ready to transcribe
#[async_trait]
pub trait LoadedModel: Send + Sync {
    fn model(&self) -> &str;

    /// Transcribe (or translate) an audio file
    async fn transcribe(&self, audio_path: &Path, options: &TranscribeOptions) -> BackendOutcome<Transcription>;
}

/// Factory for creating the configured backend and its selector
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_backend(config: &TranscriberConfig) -> Arc<dyn TranscriptionBackend> {
        match config.backend {
            BackendKind::Local => Arc::new(whisper_cli::WhisperCliBackend::new(config)),
            BackendKind::Remote => Arc::new(openai::OpenAiAudioBackend::new(config)),
        }
    }

    /// The remote API serves a single model, so it gets no downgrade step
    pub fn create_selector(config: &TranscriberConfig) -> BackendSelector {
        let backend = Self::create_backend(config);
        match config.backend {
            BackendKind::Local => BackendSelector::new(
                backend,
                config.preferred_model.clone(),
                Some(config.fallback_model.clone()).filter(|m| *m != config.preferred_model),
            ),
            BackendKind::Remote => BackendSelector::new(backend, config.api_model.clone(), None),
        }
    }
}
