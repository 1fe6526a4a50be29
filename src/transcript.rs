use serde::{Deserialize, Serialize};

/// A timed span of recognized speech.
///
/// Timing is fixed at creation; the only way to get different text is
/// [`Segment::with_text`], which returns a new segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    start: f64,
    end: f64,
    text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Same timing, different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            start: self.start,
            end: self.end,
            text: text.into(),
        }
    }
}

/// Result of one transcription run: segments in the order the backend emitted them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcription {
    pub segments: Vec<Segment>,
    /// Full-text concatenation, when the backend provides one.
    pub text: Option<String>,
    /// Language the backend detected or was told to use.
    pub language: Option<String>,
}

impl Transcription {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            text: None,
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// End time of the last segment, in seconds.
    pub fn duration(&self) -> f64 {
        self.segments.last().map(Segment::end).unwrap_or(0.0)
    }

    /// Joined segment text, used when the backend did not provide a full text.
    pub fn full_text(&self) -> String {
        match &self.text {
            Some(text) => text.trim().to_string(),
            None => self
                .segments
                .iter()
                .map(|seg| seg.text().trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_text_keeps_timing() {
        let seg = Segment::new(1.25, 3.5, "hola");
        let translated = seg.with_text("hello");

        assert_eq!(translated.start(), 1.25);
        assert_eq!(translated.end(), 3.5);
        assert_eq!(translated.text(), "hello");
        assert_eq!(seg.text(), "hola");
    }

    #[test]
    fn full_text_falls_back_to_segments() {
        let transcription = Transcription::new(vec![
            Segment::new(0.0, 1.0, " Hello "),
            Segment::new(1.0, 2.0, "   "),
            Segment::new(2.0, 3.0, "world"),
        ]);

        assert_eq!(transcription.full_text(), "Hello world");
        assert_eq!(transcription.duration(), 3.0);
    }
}
