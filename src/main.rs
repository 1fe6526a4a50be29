//! vidsub - spoken audio to timed subtitles
//!
//! Entry point: parses the command line, sets up logging and configuration,
//! and dispatches to the pipeline or one of its single-stage commands.

use anyhow::{Context, Result, bail};
use clap::Parser;
use dialoguer::Input;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vidsub::cli::{Args, BackendArg, Commands, ModeArg};
use vidsub::config::{Config, TranslationMode};
use vidsub::error::VidsubError;
use vidsub::media::MediaProcessorFactory;
use vidsub::pipeline::{Pipeline, PipelineReport, PipelineRequest, output_path_for};
use vidsub::rate_limit::RateLimiter;
use vidsub::subtitle::{read_srt, write_srt};
use vidsub::transcribe::{Task, TranscribeOptions, TranscriberFactory};
use vidsub::translate::{SegmentTranslator, TranslatorFactory};

const DEFAULT_CONFIG_FILE: &str = "vidsub.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let mut config = load_config(args.config.as_deref())?;

    let command = args.command.unwrap_or(Commands::Process {
        input: None,
        target_lang: None,
        no_translate: false,
        output: None,
        source_lang: None,
        translation_mode: None,
        backend: None,
    });

    match command {
        Commands::Process {
            input,
            target_lang,
            no_translate,
            output,
            source_lang,
            translation_mode,
            backend,
        } => {
            apply_overrides(&mut config, translation_mode, backend);

            let video_path = match input {
                Some(path) => path,
                None => prompt_video_path()?,
            };
            if !video_path.is_file() {
                bail!("Video file does not exist.");
            }

            let target_lang = match target_lang {
                Some(lang) => Some(lang),
                None if no_translate || config.translate.mode == TranslationMode::None => None,
                // whisper's own translation only targets English
                None if config.translate.mode == TranslationMode::Backend => Some("en".to_string()),
                None => Some(prompt_target_language()?),
            };

            let pipeline = Pipeline::from_config(&config, target_lang.is_some())?;
            pipeline.preflight().await?;

            let request = PipelineRequest {
                video_path,
                target_language: target_lang,
                output_path: output,
                source_language: source_lang,
            };
            let report = pipeline.run(&request).await?;
            print_report(&report);
        }
        Commands::Extract { input, output } => {
            info!("Extracting audio from: {}", input.display());
            if !input.is_file() {
                return Err(VidsubError::FileNotFound(input.display().to_string()).into());
            }

            let media = MediaProcessorFactory::create_processor(config.media.clone());
            media.check_availability().await?;
            media.extract_audio(&input, &output).await?;
            println!("Audio written to {}", output.display());
        }
        Commands::Transcribe {
            input,
            output,
            language,
            translate,
            backend,
        } => {
            apply_overrides(&mut config, None, backend);
            info!("Transcribing audio: {}", input.display());
            if !input.is_file() {
                return Err(VidsubError::FileNotFound(input.display().to_string()).into());
            }

            let selector = TranscriberFactory::create_selector(&config.transcriber);
            let options = TranscribeOptions {
                task: if translate { Task::Translate } else { Task::Transcribe },
                language,
                target_language: translate.then(|| "en".to_string()),
            };
            let selection = selector.run(&input, &options).await?;
            write_srt(&selection.transcription.segments, &output).await?;

            if let Some(downgrade) = &selection.downgrade {
                println!("Model '{}' ran out of memory, used '{}'", downgrade.from, downgrade.to);
            }
            println!(
                "Wrote {} segments to {} (model '{}')",
                selection.transcription.len(),
                output.display(),
                selection.model
            );
        }
        Commands::Translate {
            input,
            output,
            target_lang,
        } => {
            info!("Translating subtitles: {}", input.display());
            let segments = read_srt(&input).await?;

            let service = TranslatorFactory::create_translator(&config.translate)?;
            service.check_availability().await?;
            let limiter = Arc::new(RateLimiter::from_config(&config.translate.rate_limit)?);
            let translator = SegmentTranslator::new(service, limiter).with_progress(true);

            let translated = translator.translate_segments(&segments, &target_lang).await?;
            let output = output.unwrap_or_else(|| output_path_for(&input, Some(&target_lang)));
            write_srt(&translated, &output).await?;
            println!("Wrote {} segments to {}", translated.len(), output.display());
        }
        Commands::Config { write } => match write {
            Some(path) => {
                config.save_to_file(&path)?;
                println!("Configuration saved to {}", path.display());
            }
            None => print!("{}", config.to_toml()?),
        },
    }

    Ok(())
}

/// `--config`, then ./vidsub.toml, then built-in defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
            Ok(Config::from_file(DEFAULT_CONFIG_FILE)?)
        }
        None => Ok(Config::default()),
    }
}

fn apply_overrides(config: &mut Config, mode: Option<ModeArg>, backend: Option<BackendArg>) {
    if let Some(mode) = mode {
        config.translate.mode = mode.into();
    }
    if let Some(backend) = backend {
        config.transcriber.backend = backend.into();
    }
}

fn prompt_video_path() -> Result<PathBuf> {
    let path: String = Input::new()
        .with_prompt("Enter the path to the video file")
        .interact_text()?;
    Ok(PathBuf::from(path.trim()))
}

fn prompt_target_language() -> Result<String> {
    let language: String = Input::new()
        .with_prompt("Enter the language code for translation (e.g., nl for Dutch, fr for French)")
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.trim().is_empty() {
                Err("A language code is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(language.trim().to_string())
}

fn print_report(report: &PipelineReport) {
    println!("\nSubtitles written to {}", report.output_path.display());
    println!("{:<18} {:>10}", "Stage", "Time");
    println!("{}", "-".repeat(29));
    for stage in &report.stages {
        println!("{:<18} {:>9.2}s", stage.stage.to_string(), stage.elapsed.as_secs_f64());
    }
    println!("{:<18} {:>9.2}s", "total", report.total().as_secs_f64());

    if let Some(downgrade) = &report.downgrade {
        println!("Model '{}' ran out of memory, used '{}'", downgrade.from, downgrade.to);
    }
    println!(
        "{} segments, model '{}', run {} started {}",
        report.segments,
        report.model,
        report.run_id,
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".vidsub").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "vidsub.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("vidsub.log").display()
    );
    Ok(())
}
