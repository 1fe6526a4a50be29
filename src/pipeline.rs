use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, TranslationMode};
use crate::error::{Result, VidsubError};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::rate_limit::RateLimiter;
use crate::subtitle::write_srt;
use crate::transcribe::{BackendSelector, Downgrade, Task, TranscribeOptions, TranscriberFactory};
use crate::translate::{SegmentTranslator, TranslatorFactory, same_language};

/// States of one run, in the only order they can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Idle,
    AudioExtracted,
    BackendReady,
    Transcribed,
    Translated,
    Serialized,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::AudioExtracted => "audio extracted",
            PipelineStage::BackendReady => "backend ready",
            PipelineStage::Transcribed => "transcribed",
            PipelineStage::Translated => "translated",
            PipelineStage::Serialized => "serialized",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time spent reaching a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: PipelineStage,
    pub elapsed: Duration,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
    pub output_path: PathBuf,
    /// Model that produced the transcription
    pub model: String,
    #[serde(skip)]
    pub downgrade: Option<Downgrade>,
    pub segments: usize,
    /// Language of the subtitle text, when known
    pub language: Option<String>,
}

impl PipelineReport {
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|s| s.elapsed).sum()
    }

    pub fn reached(&self, stage: PipelineStage) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }
}

/// What to process and where the subtitles go.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub video_path: PathBuf,
    /// Language code of the subtitles; `None` keeps the spoken language
    pub target_language: Option<String>,
    /// Explicit destination, overriding the name derived from the video
    pub output_path: Option<PathBuf>,
    /// Spoken language hint for the speech backend
    pub source_language: Option<String>,
}

impl PipelineRequest {
    pub fn new<P: Into<PathBuf>>(video_path: P) -> Self {
        Self {
            video_path: video_path.into(),
            ..Self::default()
        }
    }

    pub fn target_language<S: Into<String>>(mut self, language: S) -> Self {
        self.target_language = Some(language.into());
        self
    }

    pub fn output_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn source_language<S: Into<String>>(mut self, language: S) -> Self {
        self.source_language = Some(language.into());
        self
    }
}

/// `<stem>.<lang>.srt` next to the video, or `<stem>.srt` without a target language.
pub fn output_path_for(video_path: &Path, target_language: Option<&str>) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "subtitles".to_string());

    let file_name = match target_language {
        Some(lang) => format!("{}.{}.srt", stem, lang),
        None => format!("{}.srt", stem),
    };
    video_path.with_file_name(file_name)
}

/// Tracks the current state and times each transition.
struct Progress {
    current: PipelineStage,
    mark: Instant,
    stages: Vec<StageReport>,
}

impl Progress {
    fn new() -> Self {
        Self {
            current: PipelineStage::Idle,
            mark: Instant::now(),
            stages: Vec::new(),
        }
    }

    fn advance(&mut self, stage: PipelineStage) {
        let elapsed = self.mark.elapsed();
        info!(
            from = %self.current,
            to = %stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline reached {} in {:.2}s",
            stage,
            elapsed.as_secs_f64()
        );
        self.current = stage;
        self.stages.push(StageReport { stage, elapsed });
        self.mark = Instant::now();
    }

    /// Wrap a failure of the step that would have led to `stage`
    fn halt(&self, stage: PipelineStage, error: VidsubError) -> VidsubError {
        warn!(reached = %self.current, failed = %stage, "Pipeline halted: {}", error);
        VidsubError::Halted {
            stage,
            source: Box::new(error),
        }
    }
}

/// Runs one video through extraction, transcription, translation and serialization.
pub struct Pipeline {
    media: Box<dyn MediaProcessorTrait>,
    selector: BackendSelector,
    translator: Option<SegmentTranslator>,
    mode: TranslationMode,
}

impl Pipeline {
    pub fn new(
        media: Box<dyn MediaProcessorTrait>,
        selector: BackendSelector,
        translator: Option<SegmentTranslator>,
        mode: TranslationMode,
    ) -> Self {
        Self {
            media,
            selector,
            translator,
            mode,
        }
    }

    /// Build the pipeline from configuration.
    ///
    /// The remote translator (and its credentials) is only required when
    /// `with_translation` is set and the configured mode is `remote`.
    pub fn from_config(config: &Config, with_translation: bool) -> Result<Self> {
        let media = MediaProcessorFactory::create_processor(config.media.clone());
        let selector = TranscriberFactory::create_selector(&config.transcriber);

        let translator = if with_translation && config.translate.mode == TranslationMode::Remote {
            let service = TranslatorFactory::create_translator(&config.translate)?;
            let limiter = Arc::new(RateLimiter::from_config(&config.translate.rate_limit)?);
            Some(SegmentTranslator::new(service, limiter).with_progress(true))
        } else {
            None
        };

        Ok(Self::new(media, selector, translator, config.translate.mode))
    }

    /// Check external tools and services before any audio work starts.
    pub async fn preflight(&self) -> Result<()> {
        self.media.check_availability().await?;
        if let Some(translator) = &self.translator {
            translator.translator().check_availability().await?;
        }
        Ok(())
    }

    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineReport> {
        let video_path = request.video_path.as_path();
        if !video_path.is_file() {
            return Err(VidsubError::FileNotFound(video_path.display().to_string()));
        }

        let target = request.target_language.as_deref();
        let remote_translation = target.is_some() && self.mode == TranslationMode::Remote;
        if remote_translation && self.translator.is_none() {
            return Err(VidsubError::Config(
                "Remote translation requested but no translator is configured".to_string(),
            ));
        }
        if let (Some(target), TranslationMode::None) = (target, self.mode) {
            return Err(VidsubError::Config(format!(
                "Translation mode 'none' keeps the spoken language and cannot produce '{}' subtitles",
                target
            )));
        }

        let options = TranscribeOptions {
            task: if target.is_some() && self.mode == TranslationMode::Backend {
                Task::Translate
            } else {
                Task::Transcribe
            },
            language: request.source_language.clone(),
            target_language: request.target_language.clone(),
        };
        options.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "Processing {}", video_path.display());
        let mut progress = Progress::new();

        // Removed on drop, whichever way the run ends
        let work_dir = tempfile::Builder::new()
            .prefix("vidsub-")
            .tempdir()
            .map_err(|e| progress.halt(PipelineStage::AudioExtracted, e.into()))?;
        let audio_path = work_dir.path().join("audio.wav");

        self.media
            .extract_audio(video_path, &audio_path)
            .await
            .map_err(|e| progress.halt(PipelineStage::AudioExtracted, e))?;
        progress.advance(PipelineStage::AudioExtracted);

        let prepared = self
            .selector
            .prepare()
            .await
            .map_err(|e| progress.halt(PipelineStage::BackendReady, e))?;
        progress.advance(PipelineStage::BackendReady);

        let selection = self
            .selector
            .transcribe(prepared, &audio_path, &options)
            .await
            .map_err(|e| progress.halt(PipelineStage::Transcribed, e))?;
        progress.advance(PipelineStage::Transcribed);

        let mut transcription = selection.transcription;
        info!(
            model = %selection.model,
            segments = transcription.len(),
            "Transcribed {:.1}s of speech",
            transcription.duration()
        );

        if let (true, Some(target), Some(translator)) = (remote_translation, target, &self.translator) {
            let detected = transcription.language.as_deref();
            if detected.is_some_and(|lang| same_language(lang, target)) {
                info!("Speech is already in '{}', skipping translation", target);
            } else {
                transcription = translator
                    .translate_transcription(&transcription, target)
                    .await
                    .map_err(|e| progress.halt(PipelineStage::Translated, e))?;
                progress.advance(PipelineStage::Translated);
            }
        }

        let output_path = request
            .output_path
            .clone()
            .unwrap_or_else(|| output_path_for(video_path, target));
        write_srt(&transcription.segments, &output_path)
            .await
            .map_err(|e| progress.halt(PipelineStage::Serialized, e))?;
        progress.advance(PipelineStage::Serialized);

        drop(work_dir);
        progress.advance(PipelineStage::Done);
        debug!(%run_id, "Temporary audio removed");

        Ok(PipelineReport {
            run_id,
            started_at,
            stages: progress.stages,
            output_path,
            model: selection.model,
            downgrade: selection.downgrade,
            segments: transcription.len(),
            language: transcription.language,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::selector::tests::{FakeBackend, Fault};
    use crate::transcript::Segment;
    use crate::translate::MockTextTranslator;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeMedia {
        fail: bool,
        extracted: Arc<Mutex<Vec<PathBuf>>>,
    }

    #[async_trait]
    impl MediaProcessorTrait for FakeMedia {
        async fn extract_audio(&self, _video_path: &Path, audio_path: &Path) -> Result<()> {
            self.extracted.lock().unwrap().push(audio_path.to_path_buf());
            if self.fail {
                return Err(VidsubError::Media("no audio stream".to_string()));
            }
            tokio::fs::write(audio_path, b"RIFF").await?;
            Ok(())
        }

        async fn check_availability(&self) -> Result<()> {
            Ok(())
        }
    }

    fn two_segments() -> Vec<Segment> {
        vec![Segment::new(0.0, 1.2, "Hello"), Segment::new(1.2, 3.005, "world")]
    }

    fn video(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("talk.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    fn uppercase_translator(calls: Arc<Mutex<Vec<String>>>) -> SegmentTranslator {
        let mut mock = MockTextTranslator::new();
        mock.expect_translate().returning(move |text, _| {
            calls.lock().unwrap().push(text.to_string());
            Ok(text.to_uppercase())
        });
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)).unwrap());
        SegmentTranslator::new(Arc::new(mock), limiter)
    }

    fn pipeline(
        media: FakeMedia,
        backend: FakeBackend,
        translator: Option<SegmentTranslator>,
        mode: TranslationMode,
    ) -> Pipeline {
        let selector = BackendSelector::new(Arc::new(backend), "large".to_string(), Some("base".to_string()));
        Pipeline::new(Box::new(media), selector, translator, mode)
    }

    fn stages(report: &PipelineReport) -> Vec<PipelineStage> {
        report.stages.iter().map(|s| s.stage).collect()
    }

    #[tokio::test]
    async fn untranslated_run_writes_the_exact_document() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let pipeline = pipeline(
            FakeMedia::default(),
            FakeBackend::with_segments(two_segments()),
            None,
            TranslationMode::None,
        );

        let report = pipeline.run(&PipelineRequest::new(&video)).await.unwrap();

        assert_eq!(report.output_path, dir.path().join("talk.srt"));
        let written = std::fs::read_to_string(&report.output_path).unwrap();
        assert_eq!(
            written,
            "1\n00:00:00,000 --> 00:00:01,200\nHello\n\n2\n00:00:01,200 --> 00:00:03,005\nworld\n\n"
        );
        assert_eq!(
            stages(&report),
            vec![
                PipelineStage::AudioExtracted,
                PipelineStage::BackendReady,
                PipelineStage::Transcribed,
                PipelineStage::Serialized,
                PipelineStage::Done,
            ]
        );
        assert_eq!(report.model, "large");
        assert_eq!(report.segments, 2);
    }

    #[tokio::test]
    async fn translated_run_uppercases_content_and_keeps_timing() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(
            FakeMedia::default(),
            FakeBackend::with_segments(two_segments()),
            Some(uppercase_translator(calls.clone())),
            TranslationMode::Remote,
        );

        let request = PipelineRequest::new(&video).target_language("nl");
        let report = pipeline.run(&request).await.unwrap();

        assert_eq!(report.output_path, dir.path().join("talk.nl.srt"));
        let written = std::fs::read_to_string(&report.output_path).unwrap();
        assert_eq!(
            written,
            "1\n00:00:00,000 --> 00:00:01,200\nHELLO\n\n2\n00:00:01,200 --> 00:00:03,005\nWORLD\n\n"
        );
        assert!(report.reached(PipelineStage::Translated));
        assert_eq!(*calls.lock().unwrap(), vec!["Hello", "world"]);
        assert_eq!(report.language.as_deref(), Some("nl"));
    }

    #[tokio::test]
    async fn speech_already_in_target_language_is_not_translated() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let mut mock = MockTextTranslator::new();
        mock.expect_translate().never();
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)).unwrap());
        let pipeline = pipeline(
            FakeMedia::default(),
            FakeBackend::with_segments(two_segments()),
            Some(SegmentTranslator::new(Arc::new(mock), limiter)),
            TranslationMode::Remote,
        );

        // the fake backend reports English speech
        let report = pipeline.run(&PipelineRequest::new(&video).target_language("en")).await.unwrap();

        assert!(!report.reached(PipelineStage::Translated));
        assert!(report.reached(PipelineStage::Done));
    }

    #[tokio::test]
    async fn backend_mode_bypasses_the_segment_translator() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let out = dir.path().join("custom.srt");
        let pipeline = pipeline(
            FakeMedia::default(),
            FakeBackend::with_segments(two_segments()),
            None,
            TranslationMode::Backend,
        );

        let request = PipelineRequest::new(&video).target_language("en").output_path(&out);
        let report = pipeline.run(&request).await.unwrap();

        assert_eq!(report.output_path, out);
        assert!(out.exists());
        assert!(!report.reached(PipelineStage::Translated));
    }

    #[tokio::test]
    async fn backend_mode_passes_the_target_hint_to_the_speech_model() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let backend = FakeBackend::with_segments(two_segments());
        let seen = backend.options.clone();
        let pipeline = pipeline(FakeMedia::default(), backend, None, TranslationMode::Backend);

        let request = PipelineRequest::new(&video).target_language("en").source_language("nl");
        let report = pipeline.run(&request).await.unwrap();

        assert_eq!(report.output_path, dir.path().join("talk.en.srt"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![TranscribeOptions {
                task: Task::Translate,
                language: Some("nl".to_string()),
                target_language: Some("en".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn remote_mode_transcribes_with_the_target_hint() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let backend = FakeBackend::with_segments(two_segments());
        let seen = backend.options.clone();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(
            FakeMedia::default(),
            backend,
            Some(uppercase_translator(calls)),
            TranslationMode::Remote,
        );

        pipeline.run(&PipelineRequest::new(&video).target_language("nl")).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].task, Task::Transcribe);
        assert_eq!(seen[0].target_language.as_deref(), Some("nl"));
    }

    #[tokio::test]
    async fn backend_mode_rejects_a_non_english_target() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let media = FakeMedia::default();
        let extracted = media.extracted.clone();
        let backend = FakeBackend::with_segments(two_segments());
        let seen = backend.options.clone();
        let pipeline = pipeline(media, backend, None, TranslationMode::Backend);

        let err = pipeline
            .run(&PipelineRequest::new(&video).target_language("nl"))
            .await
            .unwrap_err();

        assert!(matches!(err, VidsubError::Config(ref msg) if msg.contains("'nl'")));
        assert!(extracted.lock().unwrap().is_empty());
        assert!(seen.lock().unwrap().is_empty());
        assert!(!dir.path().join("talk.nl.srt").exists());
    }

    #[tokio::test]
    async fn none_mode_rejects_a_target_language() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let media = FakeMedia::default();
        let extracted = media.extracted.clone();
        let pipeline = pipeline(
            media,
            FakeBackend::with_segments(two_segments()),
            None,
            TranslationMode::None,
        );

        let err = pipeline
            .run(&PipelineRequest::new(&video).target_language("nl"))
            .await
            .unwrap_err();

        assert!(matches!(err, VidsubError::Config(ref msg) if msg.contains("'nl'")));
        assert!(extracted.lock().unwrap().is_empty());
        assert!(!dir.path().join("talk.nl.srt").exists());
    }

    #[tokio::test]
    async fn missing_video_fails_before_any_work() {
        let dir = TempDir::new().unwrap();
        let media = FakeMedia::default();
        let extracted = media.extracted.clone();
        let pipeline = pipeline(media, FakeBackend::default(), None, TranslationMode::None);

        let err = pipeline
            .run(&PipelineRequest::new(dir.path().join("missing.mp4")))
            .await
            .unwrap_err();

        assert!(matches!(err, VidsubError::FileNotFound(_)));
        assert!(extracted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extraction_failure_halts_before_the_backend_loads() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let backend = Arc::new(FakeBackend::default());
        let selector = BackendSelector::new(backend.clone(), "large".to_string(), None);
        let media = FakeMedia {
            fail: true,
            ..FakeMedia::default()
        };
        let pipeline = Pipeline::new(Box::new(media), selector, None, TranslationMode::None);

        let err = pipeline.run(&PipelineRequest::new(&video)).await.unwrap_err();

        assert!(matches!(
            err,
            VidsubError::Halted {
                stage: PipelineStage::AudioExtracted,
                ..
            }
        ));
        assert!(matches!(err.root(), VidsubError::Media(_)));
        assert!(backend.loads().is_empty());
    }

    #[tokio::test]
    async fn translation_failure_leaves_no_subtitle_file() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let media = FakeMedia::default();
        let extracted = media.extracted.clone();
        let mut mock = MockTextTranslator::new();
        mock.expect_translate()
            .returning(|_, _| Err(VidsubError::Translation("401 Unauthorized".to_string())));
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)).unwrap());
        let pipeline = pipeline(
            media,
            FakeBackend::with_segments(two_segments()),
            Some(SegmentTranslator::new(Arc::new(mock), limiter)),
            TranslationMode::Remote,
        );

        let err = pipeline
            .run(&PipelineRequest::new(&video).target_language("fr"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            VidsubError::Halted {
                stage: PipelineStage::Translated,
                ..
            }
        ));
        assert!(!dir.path().join("talk.fr.srt").exists());
        // temporary audio is gone too
        let audio = extracted.lock().unwrap()[0].clone();
        assert!(!audio.exists());
    }

    #[tokio::test]
    async fn downgrade_is_reported() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let backend = FakeBackend::with_segments(two_segments()).fault("large", Fault::ExhaustedOnTranscribe);
        let pipeline = pipeline(FakeMedia::default(), backend, None, TranslationMode::None);

        let report = pipeline.run(&PipelineRequest::new(&video)).await.unwrap();

        assert_eq!(report.model, "base");
        let downgrade = report.downgrade.unwrap();
        assert_eq!((downgrade.from.as_str(), downgrade.to.as_str()), ("large", "base"));
    }

    #[tokio::test]
    async fn remote_mode_without_translator_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let video = video(&dir);
        let pipeline = pipeline(FakeMedia::default(), FakeBackend::default(), None, TranslationMode::Remote);

        let err = pipeline
            .run(&PipelineRequest::new(&video).target_language("de"))
            .await
            .unwrap_err();

        assert!(matches!(err, VidsubError::Config(_)));
    }

    #[test]
    fn output_names_follow_the_video() {
        let video = Path::new("/videos/lecture.final.mkv");
        assert_eq!(output_path_for(video, None), PathBuf::from("/videos/lecture.final.srt"));
        assert_eq!(output_path_for(video, Some("ja")), PathBuf::from("/videos/lecture.final.ja.srt"));
    }

    #[test]
    fn stages_display_in_plain_words() {
        assert_eq!(PipelineStage::AudioExtracted.to_string(), "audio extracted");
        assert_eq!(PipelineStage::Done.to_string(), "done");
    }
}
