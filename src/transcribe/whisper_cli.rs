// Local backend: the `whisper` command-line tool (openai-whisper)

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, info};

use super::{
    BackendOutcome, LoadedModel, TranscribeOptions, TranscriptionBackend,
    common::{WhisperJsonOutput, is_resource_exhaustion},
};
use crate::config::TranscriberConfig;
use crate::error::{Result, VidsubError};
use crate::transcript::Transcription;

pub struct WhisperCliBackend {
    binary_path: String,
    device: Option<String>,
}

impl WhisperCliBackend {
    pub fn new(config: &TranscriberConfig) -> Self {
        Self {
            binary_path: config.binary_path.clone(),
            device: config.device.clone(),
        }
    }

    /// Check if the whisper command-line tool can be started
    async fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .arg("--help")
            .output()
            .await
            .map_err(|e| VidsubError::Transcription(format!("whisper command not found: {}", e)))?;

        if output.status.success() {
            debug!("Whisper command-line tool is available");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(VidsubError::Transcription(format!(
                "Whisper not available. Install with: pip install -U openai-whisper\nError: {}",
                stderr.trim()
            )))
        }
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperCliBackend {
    fn name(&self) -> &str {
        "whisper-cli"
    }

    async fn load(&self, model: &str) -> BackendOutcome<Box<dyn LoadedModel>> {
        if let Err(e) = self.check_availability().await {
            return BackendOutcome::Failed(e);
        }

        info!("Whisper model '{}' selected", model);
        BackendOutcome::Ready(Box::new(WhisperCliModel {
            binary_path: self.binary_path.clone(),
            model: model.to_string(),
            device: self.device.clone(),
        }))
    }
}

pub struct WhisperCliModel {
    binary_path: String,
    model: String,
    device: Option<String>,
}

impl WhisperCliModel {
    fn build_command(&self, audio_path: &Path, output_dir: &Path, options: &TranscribeOptions) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg(audio_path)
            .arg("--model").arg(&self.model)
            .arg("--task").arg(options.task.as_str())
            .arg("--output_dir").arg(output_dir)
            .arg("--output_format").arg("json")
            .arg("--verbose").arg("False");

        if let Some(lang) = &options.language {
            cmd.arg("--language").arg(lang);
        }
        if let Some(device) = &self.device {
            cmd.arg("--device").arg(device);
        }

        cmd
    }

    async fn run(&self, audio_path: &Path, options: &TranscribeOptions) -> Result<Transcription> {
        options.validate()?;
        debug!("Executing whisper transcription with model: {}", self.model);

        // Create temporary output directory for whisper results
        let temp_dir = tempfile::tempdir()?;
        let output_dir = temp_dir.path();

        let output = self
            .build_command(audio_path, output_dir, options)
            .output()
            .await
            .map_err(|e| VidsubError::Transcription(format!("Failed to execute whisper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&self.model, output.status, &stderr));
        }

        let json_file = json_output_path(audio_path, output_dir)?;
        let json_content = tokio::fs::read_to_string(&json_file)
            .await
            .map_err(|e| VidsubError::Transcription(format!("Failed to read whisper output: {}", e)))?;

        let whisper_output: WhisperJsonOutput = serde_json::from_str(&json_content)
            .map_err(|e| VidsubError::Transcription(format!("Failed to parse whisper JSON: {}", e)))?;

        Ok(whisper_output.into())
    }
}

#[async_trait]
impl LoadedModel for WhisperCliModel {
    fn model(&self) -> &str {
        &self.model
    }

    async fn transcribe(&self, audio_path: &Path, options: &TranscribeOptions) -> BackendOutcome<Transcription> {
        info!(
            model = %self.model,
            task = options.task.as_str(),
            "Running whisper on {}",
            audio_path.display()
        );
        self.run(audio_path, options).await.into()
    }
}

/// whisper names its JSON after the audio file stem
fn json_output_path(audio_path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let stem = audio_path
        .file_stem()
        .ok_or_else(|| VidsubError::Transcription("Invalid audio filename".to_string()))?;
    Ok(output_dir.join(format!("{}.json", stem.to_string_lossy())))
}

/// Map a failed whisper run to an error.
///
/// Only memory exhaustion may trigger a model downgrade: an out-of-memory
/// report on stderr, or SIGKILL, which is what the kernel OOM killer sends.
/// Any other signal (Ctrl-C, SIGTERM, a crash) is a plain failure.
fn classify_failure(model: &str, status: ExitStatus, stderr: &str) -> VidsubError {
    let stderr = stderr.trim();
    if is_resource_exhaustion(stderr) || killed_by_sigkill(&status) {
        return VidsubError::ResourceExhausted {
            model: model.to_string(),
            detail: last_line(stderr, "process was killed (SIGKILL)"),
        };
    }

    match (status.code(), terminating_signal(&status)) {
        (None, Some(signal)) => VidsubError::Transcription(format!(
            "Whisper was terminated by signal {}: {}",
            signal,
            last_line(stderr, "no output")
        )),
        _ => VidsubError::Transcription(format!("Whisper failed: {}", stderr)),
    }
}

#[cfg(unix)]
fn terminating_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

fn killed_by_sigkill(status: &ExitStatus) -> bool {
    const SIGKILL: i32 = 9;
    terminating_signal(status) == Some(SIGKILL)
}

fn last_line(text: &str, fallback: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
