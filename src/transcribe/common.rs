use serde::{Deserialize, Serialize};

use crate::error::{Result, VidsubError};
use crate::transcript::{Segment, Transcription};
use crate::translate::same_language;

/// What the speech model should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Text in the spoken language
    Transcribe,
    /// English text, translated by the speech model itself
    Translate,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Transcribe => "transcribe",
            Task::Translate => "translate",
        }
    }
}

/// Per-run request passed to a loaded model.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOptions {
    pub task: Task,
    /// Spoken-language hint; `None` lets the model detect it
    pub language: Option<String>,
    /// Language the caller wants the subtitles in, when any
    pub target_language: Option<String>,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            task: Task::Transcribe,
            language: None,
            target_language: None,
        }
    }
}

impl TranscribeOptions {
    /// Whisper's translate task only ever produces English.
    pub fn validate(&self) -> Result<()> {
        match (self.task, self.target_language.as_deref()) {
            (Task::Translate, Some(target)) if !same_language(target, "en") => Err(VidsubError::Config(format!(
                "The speech model can only translate into English, not '{}'",
                target
            ))),
            _ => Ok(()),
        }
    }
}

/// Outcome of a backend step.
///
/// Resource exhaustion is its own case so the selector can branch on it
/// without inspecting error text.
#[derive(Debug)]
pub enum BackendOutcome<T> {
    Ready(T),
    ResourceExhausted(String),
    Failed(VidsubError),
}

impl<T> BackendOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, BackendOutcome::Ready(_))
    }
}

impl<T> From<Result<T>> for BackendOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => BackendOutcome::Ready(value),
            Err(VidsubError::ResourceExhausted { detail, .. }) => {
                BackendOutcome::ResourceExhausted(detail)
            }
            Err(e) => BackendOutcome::Failed(e),
        }
    }
}

const EXHAUSTION_MARKERS: &[&str] = &[
    "out of memory",
    "outofmemoryerror",
    "cannot allocate memory",
    "failed to allocate",
    "bad_alloc",
    "memoryerror",
    "insufficient memory",
];

/// Whether tool output reports that the model could not get the memory it needs.
pub fn is_resource_exhaustion(message: &str) -> bool {
    let message = message.to_lowercase();
    EXHAUSTION_MARKERS.iter().any(|marker| message.contains(marker))
}

/// Whisper JSON output (`whisper --output_format json` and the API's `verbose_json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperJsonOutput {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub segments: Vec<WhisperJsonSegment>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperJsonSegment {
    #[serde(default)]
    pub id: Option<u64>,
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub avg_logprob: Option<f64>,
    #[serde(default)]
    pub no_speech_prob: Option<f64>,
}

impl From<WhisperJsonOutput> for Transcription {
    fn from(output: WhisperJsonOutput) -> Self {
        // Emission order is kept as-is
        let segments = output
            .segments
            .into_iter()
            .map(|seg| Segment::new(seg.start, seg.end, seg.text.trim()))
            .collect();

        Transcription {
            segments,
            text: output.text.map(|t| t.trim().to_string()),
            language: output.language,
        }
    }
}
