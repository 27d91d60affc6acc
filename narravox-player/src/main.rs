//! Narravox player - main entry point
//!
//! Narrates a marker-annotated text file (or stdin) through the configured
//! text-to-speech service, with the same pipeline the host integration
//! uses: marker parser → segmenter → playback scheduler → synthesis →
//! audio output.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use narravox_common::events::{EventBus, NarrationEvent};
use narravox_common::settings::{resolve_config_path, SettingsStore};
use narravox_common::voice::VoiceRegistry;
use narravox_player::playback::{PlaybackScheduler, RodioOutput};
use narravox_player::synth::HttpSpeechBackend;
use narravox_player::text::{parse_markers, segment_text};
use narravox_player::NarrationEngine;

/// Command-line arguments for narravox-player
#[derive(Parser, Debug)]
#[command(name = "narravox-player")]
#[command(about = "Narrates marker-annotated text through a TTS service")]
#[command(version)]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long, env = "NARRAVOX_CONFIG")]
    config: Option<PathBuf>,

    /// Voice registry file (JSON)
    #[arg(long, env = "NARRAVOX_VOICES")]
    voices: Option<PathBuf>,

    /// Text file to narrate; reads stdin when omitted
    #[arg(short, long)]
    text: Option<PathBuf>,

    /// Print the resolved segments instead of synthesizing audio
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "narravox_player=info,narravox_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let text = match &args.text {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            use std::io::Read;
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    let conversation_id = uuid::Uuid::new_v4();

    if args.dry_run {
        return print_segments(&text, conversation_id);
    }

    let config_path = resolve_config_path(args.config.as_deref());
    info!("Using settings from {}", config_path.display());

    let events = EventBus::new(256);
    let settings = SettingsStore::load_or_default(&config_path, events.clone());
    // The CLI was invoked to narrate; the enabled flag only gates
    // host-driven processing.
    settings.update(|s| s.enabled = true);

    let voices_path = args.voices.unwrap_or_else(|| {
        config_path
            .parent()
            .map(|dir| dir.join("voices.json"))
            .unwrap_or_else(|| PathBuf::from("voices.json"))
    });
    let voices = Arc::new(RwLock::new(VoiceRegistry::load_or_default(&voices_path)));

    let backend = Arc::new(HttpSpeechBackend::new(settings.clone()).context("HTTP client")?);
    let output = Arc::new(RodioOutput::new().context("Audio output")?);
    let scheduler = PlaybackScheduler::new(
        settings.clone(),
        voices.clone(),
        backend,
        output,
        events.clone(),
    );
    let engine = NarrationEngine::new(settings, voices, scheduler, events.clone());

    let mut event_rx = events.subscribe();

    let count = engine.on_message_ready(&text, conversation_id);
    if count == 0 {
        warn!("Nothing to narrate (no voice markers found)");
        return Ok(());
    }
    info!("Queued {} segments", count);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Ok(NarrationEvent::QueueCompleted { .. }) => {
                    info!("Narration complete");
                    break;
                }
                Ok(NarrationEvent::QueueAborted { reason, .. }) => {
                    anyhow::bail!("Narration aborted: {}", reason);
                }
                Ok(NarrationEvent::SegmentFailed { index, message, user_visible: true, .. }) => {
                    warn!("Segment {} failed: {}", index + 1, message);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(_) => break,
            },
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping playback");
                engine.scheduler().reset(true);
                break;
            }
        }
    }

    Ok(())
}

/// Parse and segment without synthesizing, printing what would be spoken
fn print_segments(text: &str, conversation_id: uuid::Uuid) -> Result<()> {
    let markers = parse_markers(text);
    let segments = segment_text(text, &markers, conversation_id);
    if segments.is_empty() {
        println!("(no speakable segments)");
        return Ok(());
    }
    for (index, segment) in segments.iter().enumerate() {
        let emotions: Vec<String> = segment
            .emotions
            .iter()
            .map(|(code, value)| format!("{}: {}", code.affect_name(), value))
            .collect();
        println!(
            "[{}] {} | {} ({}) {}",
            index + 1,
            segment.kind,
            segment.character,
            segment.voice_file,
            if emotions.is_empty() {
                "no emotions".to_string()
            } else {
                emotions.join(", ")
            }
        );
        println!("    {}", segment.text);
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
