//! vocalis CLI: standalone speech server.
//!
//! ```text
//! vocalis serve [--port 8000] [--host 0.0.0.0] [--speaker af_heart] [--kokoro-url URL | --sidecar]
//! vocalis speak "hello world" [--speaker am_adam] [--output speech.wav] [--server http://localhost:8000]
//! vocalis pull [--models-dir models]
//! ```

use std::cell::Cell;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vocalis_lib::download;
use vocalis_lib::kokoro::{KokoroLoader, SidecarOptions};
use vocalis_lib::server;
use vocalis_lib::tts::TtsService;
use vocalis_lib::vocalis_core::text_prep::DEFAULT_MAX_CHUNK_LEN;
use vocalis_lib::vocalis_core::types::{
    DownloadStatus, ErrorBody, KokoroConfig, SynthesisConfig, TtsRequest,
};

/// vocalis: text-to-speech over HTTP
#[derive(Parser)]
#[command(name = "vocalis", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the speech server
    Serve(ServeArgs),
    /// Synthesize text through a running server and save the WAV
    Speak {
        /// Text to speak
        text: String,
        /// Voice to use (server default when omitted)
        #[arg(long)]
        speaker: Option<String>,
        /// Output file
        #[arg(short, long, default_value = "speech.wav")]
        output: PathBuf,
        /// Server URL
        #[arg(long, default_value = "http://localhost:8000", env = "VOCALIS_SERVER")]
        server: String,
    },
    /// Download the Kokoro model files
    Pull {
        #[arg(long, default_value = "models", env = "VOCALIS_MODELS_DIR")]
        models_dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Listen host
    #[arg(long, default_value = "0.0.0.0", env = "VOCALIS_HOST")]
    host: String,
    /// Listen port
    #[arg(long, default_value = "8000", env = "VOCALIS_PORT")]
    port: u16,
    /// Kokoro server URL (ignored with --sidecar)
    #[arg(long, default_value = "http://127.0.0.1:3001", env = "VOCALIS_KOKORO_URL")]
    kokoro_url: String,
    /// Default voice
    #[arg(long, default_value = "af_heart", env = "VOCALIS_SPEAKER")]
    speaker: String,
    /// Kokoro language code, e.g. `a` (American English) or `b` (British English)
    #[arg(long, env = "VOCALIS_LANGUAGE")]
    language: Option<String>,
    /// Speech speed
    #[arg(long, default_value = "1.0")]
    speed: f32,
    /// Per-call model timeout in seconds
    #[arg(long, default_value = "120")]
    timeout_secs: u64,
    /// Longest text chunk sent to the model in one call
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_LEN)]
    max_chunk_len: usize,
    /// Silence between chunks
    #[arg(long, default_value = "120")]
    chunk_gap_ms: u32,
    /// Download the model and run the Kokoro engine as a child process
    #[arg(long)]
    sidecar: bool,
    /// Where model files are stored (with --sidecar)
    #[arg(long, default_value = "models", env = "VOCALIS_MODELS_DIR")]
    models_dir: PathBuf,
    /// Port for the sidecar engine
    #[arg(long, default_value = "3001")]
    sidecar_port: u16,
    /// Seconds to wait for the sidecar to answer
    #[arg(long, default_value = "60")]
    sidecar_timeout_secs: u64,
    /// Defer model loading to the first request
    #[arg(long)]
    lazy: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Speak {
            text,
            speaker,
            output,
            server,
        } => speak(text, speaker, output, &server).await,
        Command::Pull { models_dir } => pull(models_dir).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let kokoro = KokoroConfig {
        url: args.kokoro_url,
        speed: args.speed,
        timeout_secs: args.timeout_secs,
    };
    let loader = if args.sidecar {
        KokoroLoader::sidecar(
            kokoro,
            SidecarOptions {
                models_dir: args.models_dir,
                port: args.sidecar_port,
                startup_timeout: Duration::from_secs(args.sidecar_timeout_secs),
            },
        )
    } else {
        KokoroLoader::remote(kokoro)
    };

    let service = TtsService::new(
        loader,
        SynthesisConfig {
            default_speaker: args.speaker,
            language: args.language,
            max_chunk_len: args.max_chunk_len,
            chunk_gap_ms: args.chunk_gap_ms,
        },
    );

    if !args.lazy && service.model().get().await.is_err() {
        warn!("model not ready at startup; loading will be retried on the next request");
    }

    let app = server::router(service.clone());
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("vocalis listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    service.model().loader().shutdown().await;
    Ok(())
}

async fn speak(text: String, speaker: Option<String>, output: PathBuf, server: &str) -> Result<()> {
    let resp = reqwest::Client::new()
        .post(format!("{}/tts", server.trim_end_matches('/')))
        .json(&TtsRequest {
            text: Some(text),
            speaker,
        })
        .send()
        .await
        .with_context(|| format!("request to {server} failed"))?;

    let status = resp.status();
    if !status.is_success() {
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        bail!("server returned {status}: {message}");
    }

    let wav = resp.bytes().await.context("failed to read audio")?;
    tokio::fs::write(&output, &wav)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("wrote {} ({} bytes)", output.display(), wav.len());
    Ok(())
}

async fn pull(models_dir: PathBuf) -> Result<()> {
    let last_percent = Cell::new(-1i32);
    let (model, voices) = download::ensure_kokoro_models(&models_dir, |p| {
        let percent = p.percent as i32;
        if p.status == DownloadStatus::Complete {
            eprintln!("\r{}: done ({} bytes)", p.model, p.bytes_total);
            last_percent.set(-1);
        } else if percent != last_percent.get() {
            eprint!("\r{}: {percent}%", p.model);
            last_percent.set(percent);
        }
    })
    .await
    .context("model download failed")?;

    println!("{}", model.display());
    println!("{}", voices.display());
    Ok(())
}
