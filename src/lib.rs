//! vidsub - spoken audio to timed subtitles
//!
//! Extracts the audio track of a video, transcribes it with a local or remote
//! whisper backend, optionally translates every segment under a rate limit,
//! and writes the result as an SRT file.

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod rate_limit;
pub mod subtitle;
pub mod transcribe;
pub mod transcript;
pub mod translate;
