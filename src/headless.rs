//! Headless host for running the player without a display.
//!
//! Useful for soak-testing playlists on a server: sources are actually
//! fetched and images actually decoded, so broken entries surface as the same
//! errors a TV would report. Video playback is simulated with a nominal
//! duration.

use crate::error::MediaFault;
use crate::events::{SurfaceEvent, SurfaceEventSink};
use crate::overlay::{FadeState, Overlay};
use crate::playlist::{MediaLocation, PlaylistSource};
use crate::surface::{Surface, Visibility};
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::task::AbortHandle;

/// A display surface that logs what it would show.
pub struct HeadlessSurface {
    name: &'static str,
    client: reqwest::Client,
    source: PlaylistSource,
    video_duration: Duration,
    sink: Option<SurfaceEventSink>,
    current: Option<String>,
    muted: bool,
    tasks: Vec<AbortHandle>,
}

impl HeadlessSurface {
    pub fn new(
        name: &'static str,
        client: reqwest::Client,
        source: PlaylistSource,
        video_duration: Duration,
    ) -> Self {
        Self {
            name,
            client,
            source,
            video_duration,
            sink: None,
            current: None,
            muted: false,
            tasks: Vec::new(),
        }
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(tokio::spawn(task).abort_handle());
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Surface for HeadlessSurface {
    fn attach(&mut self, sink: SurfaceEventSink) {
        self.sink = Some(sink);
    }

    fn detach(&mut self) {
        self.sink = None;
        self.abort_tasks();
    }

    fn set_source(&mut self, url: &str) {
        self.current = Some(url.to_string());
    }

    fn load(&mut self) {
        let (Some(sink), Some(url)) = (self.sink.clone(), self.current.clone()) else {
            return;
        };
        let location = self.source.resolve(&url);
        let client = self.client.clone();
        let name = self.name;

        self.spawn(async move {
            sink.emit(SurfaceEvent::LoadStart);
            match probe(&client, &location).await {
                Ok(()) => {
                    sink.emit(SurfaceEvent::CanPlay);
                    sink.emit(SurfaceEvent::CanPlayThrough);
                }
                Err(fault) => {
                    tracing::warn!("[{}] Source {:?} unavailable: {}", name, location, fault);
                    sink.emit(SurfaceEvent::Error(fault));
                }
            }
        });
    }

    fn play(&mut self) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let duration = self.video_duration;
        tracing::info!(
            "[{}] Playing {}{}",
            self.name,
            self.current.as_deref().unwrap_or("<none>"),
            if self.muted { " (muted)" } else { "" }
        );

        self.spawn(async move {
            sink.emit(SurfaceEvent::PlayStarted);
            tokio::time::sleep(duration).await;
            sink.emit(SurfaceEvent::Ended);
        });
    }

    fn pause(&mut self) {
        self.abort_tasks();
    }

    fn rewind(&mut self) {
        tracing::trace!("[{}] Rewind", self.name);
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn preload_image(&mut self, url: &str) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let location = self.source.resolve(url);
        let client = self.client.clone();
        // SVG is fetched but not rasterised.
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let decode = !path.to_ascii_lowercase().ends_with(".svg");

        self.spawn(async move {
            match preload(&client, &location, decode).await {
                Ok(()) => sink.emit(SurfaceEvent::ImageLoaded),
                Err(e) => sink.emit(SurfaceEvent::ImageFailed(format!("{:#}", e))),
            };
        });
    }

    fn show_image(&mut self, url: &str) {
        tracing::info!("[{}] Showing image {}", self.name, url);
        self.current = Some(url.to_string());
    }

    fn clear(&mut self) {
        self.current = None;
        self.abort_tasks();
    }

    fn set_visibility(&mut self, visibility: Visibility) {
        tracing::debug!("[{}] Visibility {:?}", self.name, visibility);
    }
}

/// Check that a video source is reachable.
async fn probe(client: &reqwest::Client, location: &MediaLocation) -> Result<(), MediaFault> {
    match location {
        MediaLocation::Remote(url) => {
            let response = client
                .get(url.clone())
                .send()
                .await
                .map_err(|_| MediaFault::Network)?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else if status == reqwest::StatusCode::NOT_FOUND
                || status == reqwest::StatusCode::GONE
                || status == reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE
            {
                Err(MediaFault::SourceNotSupported)
            } else {
                Err(MediaFault::Network)
            }
        }
        MediaLocation::Local(path) => match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(MediaFault::SourceNotSupported),
        },
    }
}

async fn fetch_bytes(client: &reqwest::Client, location: &MediaLocation) -> Result<Vec<u8>> {
    match location {
        MediaLocation::Remote(url) => {
            let response = client
                .get(url.clone())
                .send()
                .await
                .context("Failed to send request")?
                .error_for_status()
                .context("Server returned error")?;
            let bytes = response.bytes().await.context("Failed to read response")?;
            Ok(bytes.to_vec())
        }
        MediaLocation::Local(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path)),
    }
}

/// Fetch an image and, for raster formats, decode it.
async fn preload(client: &reqwest::Client, location: &MediaLocation, decode: bool) -> Result<()> {
    let bytes = fetch_bytes(client, location).await?;
    if decode {
        let img = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .context("Image decode task failed")?
            .context("Failed to decode image")?;
        tracing::debug!("Pre-loaded {:?} ({}x{})", location, img.width(), img.height());
    } else if bytes.is_empty() {
        anyhow::bail!("Empty image");
    }
    Ok(())
}

/// Description overlay that logs its text.
#[derive(Debug, Default)]
pub struct HeadlessOverlay;

impl Overlay for HeadlessOverlay {
    fn set_text(&mut self, text: &str) {
        tracing::info!("Description: {}", text);
    }

    fn set_fade(&mut self, fade: FadeState) {
        tracing::trace!("Description fade {:?}", fade);
    }
}
