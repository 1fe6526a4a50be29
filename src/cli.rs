use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{BackendKind, TranslationMode};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (defaults to ./vidsub.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Defaults to `process`, prompting for the video and language
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Turn a video into a (translated) subtitle file
    Process {
        /// Input video file; prompted for when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Target language code (e.g. "nl"); prompted for when omitted
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Keep the spoken language, no translation
        #[arg(long, conflicts_with = "target_lang")]
        no_translate: bool,

        /// Output subtitle file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Spoken language hint
        #[arg(short, long)]
        source_lang: Option<String>,

        /// How the target language is reached
        #[arg(long, value_enum)]
        translation_mode: Option<ModeArg>,

        /// Speech backend to use
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
    },

    /// Extract audio from a video file
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Transcribe an audio file into subtitles
    Transcribe {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file
        #[arg(short, long)]
        output: PathBuf,

        /// Spoken language hint
        #[arg(short, long)]
        language: Option<String>,

        /// Let the speech backend translate to English
        #[arg(long)]
        translate: bool,

        /// Speech backend to use
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
    },

    /// Translate an existing subtitle file
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target language code
        #[arg(short, long)]
        target_lang: String,
    },

    /// Print the effective configuration
    Config {
        /// Save it to this path instead
        #[arg(short, long)]
        write: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Remote,
    Backend,
    None,
}

impl From<ModeArg> for TranslationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Remote => TranslationMode::Remote,
            ModeArg::Backend => TranslationMode::Backend,
            ModeArg::None => TranslationMode::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Local,
    Remote,
}

impl From<BackendArg> for BackendKind {
    fn from(backend: BackendArg) -> Self {
        match backend {
            BackendArg::Local => BackendKind::Local,
            BackendArg::Remote => BackendKind::Remote,
        }
    }
}
