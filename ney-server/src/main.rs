//! # Ney Calibration Server
//!
//! Measures the pitch a player produces on a ney and recommends the instrument scale
//! that would put them in tune.
//!
//! # Usage
//!
//! ```bash
//! # Start the web service
//! ney-server serve --port 5000
//!
//! # Analyse a recording on disk
//! ney-server analyze take1.wav --json
//!
//! # Record three seconds from the microphone (feature `microphone`)
//! ney-server record --seconds 3
//! ```

mod config;
mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use ney_core::{
    AnalysisError, AnalyzerConfig, AudioBuffer, AudioDecoder, FrameEstimate, Locale,
    MissingInputKind, PitchResult, messages,
};
use tracing_subscriber::EnvFilter;

use crate::config::load_config;
use crate::server::{AppState, serve};

#[derive(Parser)]
#[command(name = "ney-server")]
#[command(about = "Ney pitch calibration service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory with extra static files
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Analyse an audio file
    Analyze {
        /// Recording to analyse
        file: PathBuf,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the JSON response instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Record from the default microphone and analyse the clip
    #[cfg(feature = "microphone")]
    Record {
        /// Clip length in seconds
        #[arg(short, long, default_value = "3")]
        seconds: f64,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the JSON response instead of a summary
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            static_dir,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if static_dir.is_some() {
                config.server.static_dir = static_dir;
            }

            let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
                .parse()
                .with_context(|| format!("invalid bind address {}", config.server.host))?;

            let server = config.server;
            let state = Arc::new(AppState::new(config.analyzer));
            serve(state, addr, server.max_upload_bytes, server.static_dir.as_deref()).await?;
        }

        Commands::Analyze { file, config, json } => {
            let config = load_config(config.as_deref())?.analyzer;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;

            let analysis = tokio::task::spawn_blocking(move || analyze_file(&bytes, &config)).await??;
            report(&analysis, json)?;
        }

        #[cfg(feature = "microphone")]
        Commands::Record {
            seconds,
            config,
            json,
        } => {
            let config = load_config(config.as_deref())?.analyzer;
            let duration = std::time::Duration::from_secs_f64(seconds);

            let analysis = tokio::task::spawn_blocking(move || -> Result<Analysis> {
                let audio = ney_core::audio::record_clip(duration)?;
                analyze_audio(&audio, &config)
            })
            .await??;
            report(&analysis, json)?;
        }
    }

    Ok(())
}

/// A finished analysis plus what the summary needs to print.
struct Analysis {
    result: PitchResult,
    frames: Vec<FrameEstimate>,
    duration_secs: f64,
}

fn analyze_file(bytes: &[u8], config: &AnalyzerConfig) -> Result<Analysis> {
    if bytes.is_empty() {
        let err = AnalysisError::MissingInput(MissingInputKind::EmptyFile);
        return Err(localized(config.locale, err));
    }
    let audio = AudioDecoder::new(&config.decoder)
        .decode(bytes)
        .map_err(|e| localized(config.locale, e))?;
    analyze_audio(&audio, config)
}

fn analyze_audio(audio: &AudioBuffer, config: &AnalyzerConfig) -> Result<Analysis> {
    let (result, frames) = ney_core::analyze_buffer_with_frames(audio, config)
        .map_err(|e| localized(config.locale, e))?;
    Ok(Analysis {
        result,
        frames,
        duration_secs: audio.duration_secs(),
    })
}

fn localized(locale: Locale, err: AnalysisError) -> anyhow::Error {
    anyhow!(messages::error_message(locale, &err))
}

fn report(analysis: &Analysis, json: bool) -> Result<()> {
    let result = &analysis.result;
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("Recording: {:.2}s, {} frames", analysis.duration_secs, analysis.frames.len());
    if let Some((start, end)) = voiced_span(&analysis.frames) {
        println!("Voiced: {:.2}s to {:.2}s", start, end);
    }
    println!("Measured: {:.2} Hz", result.f_actual);
    println!("Nearest note: {} ({:.2} Hz)", result.note_actual, result.f_standard);
    println!("Deviation: {:+.2} cents", result.cents);
    println!("Effective A4: {:.2} Hz", result.a4_actual);
    println!("{}", result.recommendation_standard);
    println!("{}", result.recommendation_custom);
    Ok(())
}

/// First and last voiced frame times.
fn voiced_span(frames: &[FrameEstimate]) -> Option<(f64, f64)> {
    let mut voiced = frames.iter().filter(|f| f.voiced);
    let first = voiced.next()?;
    let last = voiced.last().unwrap_or(first);
    Some((first.time_secs, last.time_secs))
}
