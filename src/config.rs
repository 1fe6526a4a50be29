use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, VidsubError};

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transcriber: TranscriberConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Which speech backend produces the transcription
    pub backend: BackendKind,
    /// Model tried first (high accuracy, high memory)
    pub preferred_model: String,
    /// Model used once if the preferred one runs out of memory
    pub fallback_model: String,
    /// Path to the local whisper command-line tool
    pub binary_path: String,
    /// Compute device passed to the local tool (e.g. "cuda", "cpu")
    pub device: Option<String>,
    /// Base URL of the remote transcription API
    pub endpoint: String,
    /// Model name sent to the remote transcription API
    pub api_model: String,
    /// Environment variable holding the remote API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local: run the whisper command-line tool
    Local,
    /// Remote: OpenAI audio transcription API
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Service used for per-segment translation
    pub provider: TranslationProvider,
    /// How the target language is reached
    pub mode: TranslationMode,
    /// Base URL of the translation service; defaults per provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Model used for translation; defaults per provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Environment variable holding the API key (unused by Ollama)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Throttle applied to every translation request
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    /// OpenAI chat completions
    OpenAi,
    /// Local Ollama server
    Ollama,
}

impl TranslationProvider {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            TranslationProvider::OpenAi => "https://api.openai.com/v1",
            TranslationProvider::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            TranslationProvider::OpenAi => "gpt-4",
            TranslationProvider::Ollama => "llama3.2:3b",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationMode {
    /// Remote: transcribe in the spoken language, then translate each segment
    Remote,
    /// Backend: the speech model translates to English while transcribing
    Backend,
    /// None: plain transcription
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Calls allowed per window
    pub calls: u32,
    /// Window length in seconds
    pub period_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Sample rate of the extracted audio
    pub sample_rate: u32,
    /// Channel count of the extracted audio
    pub channels: u32,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            preferred_model: "large".to_string(),
            fallback_model: "base".to_string(),
            binary_path: "whisper".to_string(),
            device: None,
            endpoint: "https://api.openai.com/v1".to_string(),
            api_model: "whisper-1".to_string(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::OpenAi,
            mode: TranslationMode::Remote,
            endpoint: None,
            model: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl TranslateConfig {
    /// Configured endpoint, else the provider's default
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }

    /// Configured model, else the provider's default
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or_else(|| self.provider.default_model())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls: 3,
            period_secs: 60,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            sample_rate: 16000,
            channels: 1,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VidsubError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| VidsubError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| VidsubError::Config(format!("Failed to serialize config: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;

        std::fs::write(path, content)
            .map_err(|e| VidsubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
