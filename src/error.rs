use thiserror::Error;

use crate::pipeline::PipelineStage;

#[derive(Error, Debug)]
pub enum VidsubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transcription error: {0}")]
    Transcription(String),

    /// The backend could not allocate memory or capacity for the requested model.
    #[error("Resource exhausted while running model '{model}': {detail}")]
    ResourceExhausted { model: String, detail: String },

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Subtitle format error: {0}")]
    Subtitle(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Pipeline halted at {stage}: {source}")]
    Halted {
        stage: PipelineStage,
        #[source]
        source: Box<VidsubError>,
    },
}

impl VidsubError {
    /// The error that actually stopped the run, looking through `Halted`.
    pub fn root(&self) -> &VidsubError {
        match self {
            VidsubError::Halted { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, VidsubError>;
