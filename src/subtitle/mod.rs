//! SRT rendering, publishing and parsing.

pub mod timecode;

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

pub use timecode::{format_timestamp, parse_timestamp};

use crate::error::{Result, VidsubError};
use crate::transcript::Segment;

/// One numbered block of an SRT document.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    pub index: usize,
    pub start: String,
    pub end: String,
    pub content: String,
}

impl SubtitleEntry {
    fn from_segment(index: usize, segment: &Segment) -> Self {
        Self {
            index,
            start: format_timestamp(segment.start()),
            end: format_timestamp(segment.end()),
            content: normalize_content(segment.text()),
        }
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n\n",
            self.index, self.start, self.end, self.content
        )
    }
}

/// A blank line ends an SRT block, so content keeps only its non-blank lines.
fn normalize_content(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number segments 1..N in the order given.
pub fn entries(segments: &[Segment]) -> Vec<SubtitleEntry> {
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| SubtitleEntry::from_segment(index + 1, segment))
        .collect()
}

/// Render segments as an SRT document.
pub fn render_srt(segments: &[Segment]) -> String {
    entries(segments)
        .iter()
        .map(SubtitleEntry::to_string)
        .collect()
}

/// Generate SRT subtitle file from segments.
///
/// The document is written to a temporary file next to `output_path` and
/// renamed into place, so a failed write never leaves a truncated file behind.
pub async fn write_srt<P: AsRef<Path>>(segments: &[Segment], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref().to_path_buf();
    info!("Generating SRT file: {}", output_path.display());

    let content = render_srt(segments);
    let target = output_path.clone();
    tokio::task::spawn_blocking(move || publish(&target, content.as_bytes()))
        .await
        .map_err(|e| VidsubError::Subtitle(format!("SRT writer task failed: {}", e)))??;

    info!(entries = segments.len(), "SRT file generated successfully");
    Ok(())
}

fn publish(output_path: &Path, content: &[u8]) -> Result<()> {
    let directory = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut staged = NamedTempFile::new_in(&directory)?;
    debug!("Staging subtitles in {}", staged.path().display());
    staged.write_all(content)?;
    staged.as_file().sync_all()?;
    staged.persist(output_path).map_err(|e| VidsubError::Io(e.error))?;
    Ok(())
}

/// Parse an SRT document back into segments.
///
/// Entry numbers are validated but not kept: the returned order is document order.
pub fn parse_srt(content: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut lines = content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .peekable();

    loop {
        while lines.next_if(|line| line.trim().is_empty()).is_some() {}

        let Some(index_line) = lines.next() else {
            break;
        };
        index_line.trim().parse::<usize>().map_err(|_| {
            VidsubError::Subtitle(format!("Expected entry number, found '{}'", index_line))
        })?;

        let timing = lines.next().ok_or_else(|| {
            VidsubError::Subtitle(format!("Entry {} has no timing line", index_line.trim()))
        })?;
        let (start, end) = timing.split_once("-->").ok_or_else(|| {
            VidsubError::Subtitle(format!("Invalid timing line '{}'", timing))
        })?;
        // Anything after the end time code (positioning hints) is ignored
        let end = end.split_whitespace().next().unwrap_or_default();

        let mut content = Vec::new();
        while let Some(line) = lines.next_if(|line| !line.trim().is_empty()) {
            content.push(line);
        }

        segments.push(Segment::new(
            parse_timestamp(start)?,
            parse_timestamp(end)?,
            content.join("\n"),
        ));
    }

    Ok(segments)
}

/// Read and parse an SRT file.
pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<Vec<Segment>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VidsubError::FileNotFound(path.display().to_string()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_srt(&content)
}
