use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use flowtype_engine::audio::{resample::resample_to, wav::decode_wav_file};
use flowtype_engine::{
    preferred_thread_count, ConfigStore, EngineConfig, ModelManager, TranscriptionEngine,
    WhisperCppLib, WhisperOptions,
};

#[derive(Parser)]
#[command(name = "flowtype-engine", about = "Serialized whisper.cpp transcription")]
struct Cli {
    /// JSON engine config; created with defaults if missing
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model name (ggml-<name>.bin in --models-dir) or path to a model file
    #[arg(long, global = true, default_value = "base")]
    model: String,

    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// Load the model from this path relative to --models-dir instead of --model
    #[arg(long, global = true)]
    asset: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe a WAV file
    Transcribe {
        wav: PathBuf,
        /// Print one timestamped line per segment
        #[arg(long)]
        timestamps: bool,
    },
    /// Run the native memcpy / mul_mat benchmarks
    Bench {
        #[arg(long)]
        threads: Option<usize>,
        #[arg(long, value_enum, default_value_t = BenchKind::All)]
        kind: BenchKind,
    },
    /// Print whisper.cpp build info
    SystemInfo,
}

#[derive(Clone, Copy, ValueEnum)]
enum BenchKind {
    Memcpy,
    MulMat,
    All,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigStore::new(path).load(),
        None => EngineConfig::default(),
    };
    let lib = Arc::new(WhisperCppLib::new(WhisperOptions {
        language: config.language.clone(),
        translate: config.translate,
    }));

    if let Command::SystemInfo = cli.command {
        println!("{}", TranscriptionEngine::system_info(lib.as_ref()));
        return Ok(());
    }

    let models = match &cli.models_dir {
        Some(dir) => ModelManager::with_dir(dir),
        None => ModelManager::new(),
    };
    let engine = match &cli.asset {
        Some(asset) => TranscriptionEngine::from_asset(lib, &models.assets(), asset, &config),
        None => {
            let model_path = models.locate(&cli.model)?;
            TranscriptionEngine::from_file(lib, &model_path, &config)
        }
    }
    .context("Failed to load Whisper model")?;

    match cli.command {
        Command::Transcribe { wav, timestamps } => {
            let audio = decode_wav_file(&wav)
                .with_context(|| format!("Failed to read {:?}", wav))?;
            let audio = resample_to(&audio, config.default_sample_rate)?;
            info!("Processing {} samples...", audio.samples.len());

            let t0 = Instant::now();
            if timestamps {
                let segments =
                    engine.transcribe_to_segments(audio.samples, Some(audio.sample_rate))?;
                for segment in &segments {
                    println!("{} {}", segment.format_timestamp(), segment.text.trim());
                }
            } else {
                let text = engine.transcribe_to_text(audio.samples, Some(audio.sample_rate))?;
                println!("{}", text.trim());
            }
            info!("Whisper done in {:?}", t0.elapsed());
        }
        Command::Bench { threads, kind } => {
            let threads = threads.unwrap_or_else(preferred_thread_count);
            if matches!(kind, BenchKind::Memcpy | BenchKind::All) {
                println!("{}", engine.bench_memcpy(threads)?);
            }
            if matches!(kind, BenchKind::MulMat | BenchKind::All) {
                println!("{}", engine.bench_mul_mat(threads)?);
            }
        }
        Command::SystemInfo => {}
    }

    engine.release()?;
    Ok(())
}
