use anyhow::{Context, Result};
use clap::Parser;
use kiosk_player::event_log::DailyFileSink;
use kiosk_player::headless::{HeadlessOverlay, HeadlessSurface};
use kiosk_player::overlay::DescriptionOverlay;
use kiosk_player::surface::DualSurfaceController;
use kiosk_player::{EventLog, Player, PlayerEvent, PlaylistLoader, PlaylistSource, Scheduler, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Looping kiosk media player.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Settings file (TOML). Defaults to ./kiosk.toml if present.
    #[arg(short, long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    /// Playlist path or URL, overriding the settings file.
    #[arg(short, long)]
    playlist: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kiosk_player=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(playlist) = args.playlist {
        settings.playlist = playlist;
    }

    let log = if settings.log_to_file {
        let dir = &settings.log_dir;
        let sink = DailyFileSink::new(dir)
            .with_context(|| format!("Failed to create log directory {:?}", dir))?;
        let today = chrono::Utc::now().date_naive();
        if let Err(e) = sink.prune(today, settings.log_retention_days) {
            tracing::warn!("Failed to prune old event logs: {}", e);
        }
        EventLog::new(Box::new(sink))
    } else {
        EventLog::tracing_only()
    };

    let source = PlaylistSource::parse(&settings.playlist);
    let client = reqwest::Client::new();
    let (scheduler, events) = Scheduler::channel();
    let video_duration = settings.headless.video_duration();

    let primary = HeadlessSurface::new("primary", client.clone(), source.clone(), video_duration);
    let secondary = HeadlessSurface::new("secondary", client.clone(), source.clone(), video_duration);
    let surfaces = DualSurfaceController::new(
        Box::new(primary),
        Box::new(secondary),
        scheduler.clone(),
        &settings.timings,
    );
    let overlay = DescriptionOverlay::new(Box::new(HeadlessOverlay));

    let mut player = Player::new(surfaces, overlay, log, scheduler.clone(), &settings.timings);
    let loader = PlaylistLoader::new(source, client);

    tracing::info!("Starting player with playlist {}", loader.source().describe());
    if player.boot(&loader).await.is_err() {
        return Ok(ExitCode::FAILURE);
    }

    let shutdown = scheduler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            shutdown.send(PlayerEvent::Shutdown);
        }
    });

    player.run(events).await;
    Ok(ExitCode::SUCCESS)
}
