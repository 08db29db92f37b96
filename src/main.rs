use anyhow::{Context, Result};
use appointment_recorder::{
    create_router, AppState, CaptureDevice, Chunk, Config, SessionEvent, SessionFactory,
    WavCaptureDevice,
};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "appointment-recorder", version, about = "Chunked appointment audio recorder")]
struct Cli {
    /// Config file (extension optional; defaults apply when missing)
    #[arg(long, default_value = "config/appointment-recorder")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP control API
    Serve,
    /// Record one appointment with the tone generator for a fixed time
    Record {
        #[arg(long)]
        appointment_id: String,
        #[arg(long, default_value_t = 40)]
        seconds: u64,
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
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Recordings directory: {}", cfg.recording.recordings_path);
    info!(
        "Chunks every {}s, interruption grace {}s",
        cfg.recording.chunk_duration_secs, cfg.recording.interruption_grace_secs
    );

    let device: Arc<dyn CaptureDevice> = Arc::new(WavCaptureDevice::new());
    let factory = SessionFactory::new(device, cfg.session_config());

    match cli.command {
        Commands::Serve => serve(&cfg, factory).await,
        Commands::Record {
            appointment_id,
            seconds,
        } => record(factory, appointment_id, seconds).await,
    }
}

async fn serve(cfg: &Config, factory: SessionFactory) -> Result<()> {
    let addr = cfg.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);

    axum::serve(listener, create_router(AppState::new(factory)))
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn record(factory: SessionFactory, appointment_id: String, seconds: u64) -> Result<()> {
    let (controller, chunks) = factory.create()?;

    let mut events = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::PauseChanged { paused, forced } => {
                    info!("Pause state changed: paused={} forced={}", paused, forced)
                }
                SessionEvent::RotationFailed { message } => warn!("Rotation failed: {}", message),
                _ => {}
            }
        }
    });

    let collector = tokio::spawn(chunks.collect::<Vec<Chunk>>());

    controller.start_recording(appointment_id).await?;

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted; stopping recording"),
    }

    if !controller.stop_recording().await? {
        warn!("Recording was paused; resuming so it can be ended");
        controller.resume_recording().await?;
        controller.stop_recording().await?;
    }

    let chunks = collector.await.context("Chunk collector panicked")?;

    println!("Recorded {} chunks:", chunks.len());
    for chunk in &chunks {
        println!(
            "  #{:<3} {:?}{} {}",
            chunk.position,
            chunk.status,
            if chunk.is_last_chunk { " (last)" } else { "" },
            chunk.uri.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
