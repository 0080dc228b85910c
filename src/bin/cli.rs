//! CLI binary for sahayak.

use clap::{Parser, Subcommand};
use sahayak::audio::{
    CaptureEvent, InputCapture, NullPlayback, Playback, StdinCapture, WavFilePlayback,
};
use sahayak::{Role, SahayakConfig, TurnPipeline};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Sahayak: a calm, text-first wellness companion.
#[derive(Parser)]
#[command(name = "sahayak", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write reply audio as WAV clips into this directory.
    #[arg(long)]
    audio_dir: Option<PathBuf>,

    /// Skip speech synthesis.
    #[arg(long)]
    no_speech: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Start a conversation on standard input.
    Chat,

    /// Write the default configuration file and exit.
    InitConfig {
        /// Destination (defaults to the standard config path).
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with the conversation.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sahayak=info,reqwest=warn,hyper=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => SahayakConfig::from_file(path)?,
        None => {
            let default_path = SahayakConfig::default_config_path();
            if default_path.exists() {
                SahayakConfig::from_file(&default_path)?
            } else {
                SahayakConfig::default()
            }
        }
    };
    if cli.no_speech {
        config.audio.speech_enabled = false;
    }
    if let Some(dir) = cli.audio_dir {
        config.audio.output_dir = Some(dir);
    }

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(config).await,
        Command::InitConfig { path } => {
            let path = path.unwrap_or_else(SahayakConfig::default_config_path);
            config.save_to_file(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

async fn run_chat(config: SahayakConfig) -> anyhow::Result<()> {
    println!("Sahayak v{}", env!("CARGO_PKG_VERSION"));

    let playback: Arc<dyn Playback> = match &config.audio.output_dir {
        Some(dir) => Arc::new(WavFilePlayback::new(dir, config.audio.sample_rate)?),
        None => Arc::new(NullPlayback),
    };
    let pipeline = TurnPipeline::from_config(&config)?.with_playback(playback);

    let mut capture = StdinCapture::stdin();
    let (tx, mut rx) = mpsc::channel(8);
    capture.start(tx).await?;

    println!("\nHi, I'm Sahayak. How are you feeling today?");
    println!("Type a message. /memory shows recent messages, /clear forgets them. Ctrl+C quits.\n");

    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down...");
                break;
            }
        };
        let line = match event {
            Some(CaptureEvent::Transcript(line)) => line,
            Some(CaptureEvent::Error(e)) => {
                warn!(error = %e, "input closed with an error");
                break;
            }
            None => break,
        };

        match line.trim() {
            "/clear" => {
                pipeline.clear_memory();
                println!("Memory cleared. We can start fresh.\n");
            }
            "/memory" => print_memory(&pipeline),
            _ => {
                let outcome = pipeline.process_turn(&line).await?;
                for message in outcome
                    .appended
                    .iter()
                    .filter(|m| m.role == Role::Agent)
                {
                    println!("Sahayak: {}", message.text);
                }
                println!();
            }
        }
    }

    capture.stop().await?;
    Ok(())
}

fn print_memory(pipeline: &TurnPipeline) {
    let entries = pipeline.conversation().with(|s| s.memory_preview());
    if entries.is_empty() {
        println!("(nothing remembered yet)\n");
        return;
    }
    for entry in entries {
        println!("  {} {}", entry.label, entry.preview);
    }
    println!();
}
