use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, info};

use super::{TextTranslator, common::language_code_to_name};
use crate::error::{Result, VidsubError};
use crate::rate_limit::RateLimiter;
use crate::transcript::{Segment, Transcription};

/// Translates a transcript segment by segment.
///
/// Calls go out one at a time, in order, each behind a slot from the shared
/// limiter. Segments with no text are carried over as-is and cost no call.
pub struct SegmentTranslator {
    translator: Arc<dyn TextTranslator>,
    limiter: Arc<RateLimiter>,
    show_progress: bool,
}

impl SegmentTranslator {
    pub fn new(translator: Arc<dyn TextTranslator>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            translator,
            limiter,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn translator(&self) -> &Arc<dyn TextTranslator> {
        &self.translator
    }

    /// Return a new sequence with translated text and unchanged timing.
    ///
    /// The first failing call stops the pass; nothing partial is returned.
    pub async fn translate_segments(&self, segments: &[Segment], target_language: &str) -> Result<Vec<Segment>> {
        let label = language_code_to_name(target_language);
        info!("Translating {} segments to {}", segments.len(), label);

        let progress = self.progress_bar(segments.len() as u64);
        let mut translated = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            if segment.text().trim().is_empty() {
                debug!("Segment {} has no text, skipping", i + 1);
                translated.push(segment.clone());
                progress.inc(1);
                continue;
            }

            self.limiter.acquire().await;
            let text = self
                .translator
                .translate(segment.text(), &label)
                .await
                .map_err(|e| {
                    progress.abandon();
                    VidsubError::Translation(format!("Segment {} failed: {}", i + 1, e))
                })?;

            debug!("Segment {}: '{}' -> '{}'", i + 1, segment.text(), text);
            translated.push(segment.with_text(text));
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(translated)
    }

    pub async fn translate_transcription(&self, transcription: &Transcription, target_language: &str) -> Result<Transcription> {
        let segments = self.translate_segments(&transcription.segments, target_language).await?;
        Ok(Transcription {
            segments,
            text: None,
            language: Some(target_language.to_string()),
        })
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let pb = ProgressBar::new(len);
        pb.set_style(style);
        pb
    }
}
