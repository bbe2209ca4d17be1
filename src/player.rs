//! Playback orchestration.
//!
//! The [`Player`] is the session object: it owns the playlist cursor, both
//! surfaces, the media loader, the description overlay and the event log,
//! and runs the state machine
//!
//! ```text
//! Idle -> Loading(0) -> WaitingReady(0) -> Playing(0)
//!      -> Loading(i) -> WaitingReady(i) -> Transitioning(i) -> Playing(i) -> ...
//! ```
//!
//! Both "ended" and "error" move on to the next item. Nothing a single item
//! does can stop the loop.

use crate::config::Timings;
use crate::error::PlaylistError;
use crate::event_log::EventLog;
use crate::events::{CrossfadeStep, PlayerEvent, Scheduler, SurfaceId};
use crate::media::{LoaderSignal, MediaLoader};
use crate::overlay::DescriptionOverlay;
use crate::playlist::{Playlist, PlaylistCursor, PlaylistLoader};
use crate::surface::{CrossfadeStart, DualSurfaceController};
use std::time::Duration;
use tokio::sync::mpsc;

/// Where the player is in the cycle, with the playlist index involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No playlist yet.
    Idle,
    /// Item chosen but not yet bound to a surface (possibly deferred).
    Loading(usize),
    /// Item bound, waiting for its ready signal.
    WaitingReady(usize),
    /// Crossfading to the item.
    Transitioning(usize),
    Playing(usize),
}

pub struct Player {
    cursor: Option<PlaylistCursor>,
    surfaces: DualSurfaceController,
    loader: MediaLoader,
    overlay: DescriptionOverlay,
    log: EventLog,
    scheduler: Scheduler,
    state: PlaybackState,
    play_retry: Duration,
}

impl Player {
    pub fn new(
        surfaces: DualSurfaceController,
        overlay: DescriptionOverlay,
        log: EventLog,
        scheduler: Scheduler,
        timings: &Timings,
    ) -> Self {
        Self {
            cursor: None,
            loader: MediaLoader::new(scheduler.clone(), timings.clone()),
            surfaces,
            overlay,
            log,
            scheduler,
            state: PlaybackState::Idle,
            play_retry: timings.play_retry(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cursor(&self) -> Option<&PlaylistCursor> {
        self.cursor.as_ref()
    }

    pub fn surfaces(&self) -> &DualSurfaceController {
        &self.surfaces
    }

    /// Load the playlist and start playback.
    ///
    /// A playlist error is logged and reported as `Err`; it is fatal to boot.
    /// Returns `Ok(false)` if a load was already in flight.
    pub async fn boot(&mut self, loader: &PlaylistLoader) -> Result<bool, PlaylistError> {
        if self.state != PlaybackState::Idle {
            tracing::debug!("Player already started, ignoring boot");
            return Ok(false);
        }
        match loader.load().await {
            Ok(Some(playlist)) => {
                self.start(playlist);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.log.error(format!("Failed to load playlist: {}", e));
                Err(e)
            }
        }
    }

    /// Start playing `playlist` from its first item.
    ///
    /// The first item goes straight onto the active surface; there is
    /// nothing to crossfade from.
    pub fn start(&mut self, playlist: Playlist) {
        if self.state != PlaybackState::Idle {
            tracing::warn!("Player already started, ignoring new playlist");
            return;
        }
        let cursor = PlaylistCursor::new(playlist);
        let item = cursor.current().clone();
        let index = cursor.index();
        self.cursor = Some(cursor);
        self.state = PlaybackState::Loading(index);

        let active = self.surfaces.active_id();
        self.surfaces.show_initial();
        self.loader
            .bind(active, index, &item, self.surfaces.surface_mut(active));
        self.state = PlaybackState::WaitingReady(index);

        self.log.info(format!("Waiting for first item: {}", item.label()));
    }

    /// Handle events until `Shutdown` arrives or every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<PlayerEvent>) {
        while let Some(event) = events.recv().await {
            if !self.handle(event) {
                break;
            }
        }
        tracing::info!("Player stopped");
    }

    /// Handle one event. Returns false on shutdown.
    pub fn handle(&mut self, event: PlayerEvent) -> bool {
        match event {
            PlayerEvent::Surface {
                surface,
                generation,
                event,
            } => {
                let signal = self.loader.handle_surface_event(
                    surface,
                    generation,
                    event,
                    self.surfaces.surface_mut(surface),
                );
                if let Some(signal) = signal {
                    self.on_signal(surface, signal);
                }
            }
            PlayerEvent::Timer {
                surface,
                generation,
                timer,
            } => {
                let signal = self.loader.handle_timer(
                    surface,
                    generation,
                    timer,
                    self.surfaces.surface_mut(surface),
                );
                if let Some(signal) = signal {
                    self.on_signal(surface, signal);
                }
            }
            PlayerEvent::Crossfade(step) => self.on_crossfade_step(step),
            PlayerEvent::PlayItem(index) => self.play_item(index),
            PlayerEvent::Shutdown => return false,
        }
        true
    }

    fn on_signal(&mut self, surface: SurfaceId, signal: LoaderSignal) {
        match signal {
            LoaderSignal::Ready { index, item, grade } => {
                self.overlay.update(&item, index);

                if surface == self.surfaces.active_id() {
                    self.state = PlaybackState::Playing(index);
                    self.log.info(format!("Active item ready ({:?}): {}", grade, item.label()));
                    return;
                }

                match self.surfaces.crossfade() {
                    CrossfadeStart::Started => {
                        tracing::debug!("Item {} ready ({:?}), crossfading", index, grade);
                        self.state = PlaybackState::Transitioning(index);
                    }
                    CrossfadeStart::AlreadyInProgress => {
                        tracing::warn!("Item {} ready during a running crossfade", index);
                    }
                }
            }
            LoaderSignal::Ended { index, item } => {
                tracing::debug!("Item {} ended: {}", index, item.label());
                self.loader.detach(surface, self.surfaces.surface_mut(surface));
                self.advance();
            }
            LoaderSignal::Failed { index, item, error } => {
                self.log.video_error(
                    format!("Failed to load {} (index {}): {}. Skipping.", item.label(), index, error),
                    &item.url,
                    error.code(),
                );
                self.loader.detach(surface, self.surfaces.surface_mut(surface));
                self.advance();
            }
            LoaderSignal::StartFailed { index, item, reason } => {
                self.log.error(format!(
                    "Could not start playback of {} (index {}) after muted retry: {}",
                    item.label(),
                    index,
                    reason
                ));
            }
        }
    }

    /// Move the cursor forward and play the new current item.
    fn advance(&mut self) {
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };
        cursor.advance();
        let index = cursor.index();
        let to = cursor.current().label().to_string();
        let from = cursor
            .item(cursor.previous_index())
            .map(|item| item.label().to_string())
            .unwrap_or_default();

        self.log.video_change(&from, &to, index);
        self.play_item(index);
    }

    /// Bind the item at `index` to the inactive surface.
    ///
    /// While a crossfade is running the request is deferred and retried.
    fn play_item(&mut self, index: usize) {
        let Some(item) = self.cursor.as_ref().and_then(|c| c.item(index)).cloned() else {
            self.log.error(format!("No playlist item at index {}", index));
            return;
        };
        self.state = PlaybackState::Loading(index);

        if self.surfaces.is_transitioning() {
            tracing::info!("Crossfade in progress, deferring item {}", index);
            let _ = self.scheduler.after(self.play_retry, PlayerEvent::PlayItem(index));
            return;
        }

        for id in [SurfaceId::Primary, SurfaceId::Secondary] {
            self.loader.detach(id, self.surfaces.surface_mut(id));
        }

        let inactive = self.surfaces.inactive_id();
        self.loader
            .bind(inactive, index, &item, self.surfaces.surface_mut(inactive));
        self.state = PlaybackState::WaitingReady(index);
    }

    fn on_crossfade_step(&mut self, step: CrossfadeStep) {
        if step == CrossfadeStep::Finish {
            let outgoing = self.surfaces.active_id();
            if self.loader.generation(outgoing).is_some() {
                self.loader.detach(outgoing, self.surfaces.surface_mut(outgoing));
            }
        }

        if let Some(active) = self.surfaces.step(step) {
            if let PlaybackState::Transitioning(index) = self.state {
                self.state = PlaybackState::Playing(index);
            }
            let label = self
                .loader
                .bound_index(active)
                .and_then(|i| self.cursor.as_ref().and_then(|c| c.item(i)))
                .map(|item| item.label().to_string())
                .unwrap_or_default();
            self.log.info(format!("Now showing on {} surface: {}", active.as_str(), label));
        }
    }
}
