//! Binds playlist items to surfaces and interprets their lifecycle.
//!
//! Videos report readiness and completion natively. Images have no playback
//! lifecycle, so the loader synthesizes one: a pre-load, a ready signal, and
//! an "ended" timer after the display duration, guarded by a watchdog.

use crate::config::Timings;
use crate::error::MediaLoadError;
use crate::events::{PlayerEvent, Scheduler, SurfaceEvent, SurfaceId, TimerHandle, TimerKind};
use crate::playlist::{MediaType, PlaylistItem};
use crate::surface::Surface;
use std::time::Duration;

/// How much of an item was buffered when it was reported ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessGrade {
    /// Can play through without further stalls.
    FullyBuffered,
    /// Minimal playability only.
    Playable,
}

/// Outcome reported to the player for a bound item.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderSignal {
    Ready {
        index: usize,
        item: PlaylistItem,
        grade: ReadinessGrade,
    },
    Ended {
        index: usize,
        item: PlaylistItem,
    },
    Failed {
        index: usize,
        item: PlaylistItem,
        error: MediaLoadError,
    },
    /// Playback could not be started even after the muted retry. Not a load
    /// error: the item stays bound.
    StartFailed {
        index: usize,
        item: PlaylistItem,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Loading,
    Ready,
    Finished,
}

/// One item bound to one surface.
#[derive(Debug)]
struct Binding {
    generation: u64,
    index: usize,
    item: PlaylistItem,
    media_type: MediaType,
    phase: Phase,
    play_attempts: u8,
    /// Set while the surface is muted for an autoplay retry.
    muted: bool,
    timers: Vec<(TimerKind, TimerHandle)>,
}

impl Binding {
    fn cancel_timer(&mut self, kind: TimerKind) {
        if let Some(pos) = self.timers.iter().position(|(k, _)| *k == kind) {
            let (_, handle) = self.timers.swap_remove(pos);
            handle.cancel();
        }
    }

    fn has_timer(&self, kind: TimerKind) -> bool {
        self.timers.iter().any(|(k, _)| *k == kind)
    }

    fn forget_timer(&mut self, kind: TimerKind) {
        self.timers.retain(|(k, _)| *k != kind);
    }

    fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain(..) {
            handle.cancel();
        }
    }

    fn finish(&mut self) {
        self.phase = Phase::Finished;
        self.cancel_all();
    }
}

/// Attaches items to surfaces and turns raw surface events into [`LoaderSignal`]s.
pub struct MediaLoader {
    bindings: [Option<Binding>; 2],
    next_generation: u64,
    scheduler: Scheduler,
    timings: Timings,
}

impl MediaLoader {
    pub fn new(scheduler: Scheduler, timings: Timings) -> Self {
        Self {
            bindings: [None, None],
            next_generation: 1,
            scheduler,
            timings,
        }
    }

    /// Generation of the live binding on `surface_id`, if any.
    pub fn generation(&self, surface_id: SurfaceId) -> Option<u64> {
        self.bindings[surface_id.index()].as_ref().map(|b| b.generation)
    }

    /// Index of the item bound to `surface_id`, if any.
    pub fn bound_index(&self, surface_id: SurfaceId) -> Option<usize> {
        self.bindings[surface_id.index()].as_ref().map(|b| b.index)
    }

    /// Bind `item` to a surface, replacing whatever was bound there.
    pub fn bind(
        &mut self,
        surface_id: SurfaceId,
        index: usize,
        item: &PlaylistItem,
        surface: &mut dyn Surface,
    ) {
        self.detach(surface_id, surface);

        let generation = self.next_generation;
        self.next_generation += 1;

        let media_type = item.resolved_type();
        let mut binding = Binding {
            generation,
            index,
            item: item.clone(),
            media_type,
            phase: Phase::Loading,
            play_attempts: 0,
            muted: false,
            timers: Vec::new(),
        };

        surface.attach(self.scheduler.sink(surface_id, generation));
        match media_type {
            MediaType::Video => {
                surface.set_source(&item.url);
                surface.load();
            }
            MediaType::Image => {
                surface.preload_image(&item.url);
                let watchdog = self.timer(
                    surface_id,
                    generation,
                    TimerKind::ImageWatchdog,
                    self.timings.image_watchdog(),
                );
                binding.timers.push((TimerKind::ImageWatchdog, watchdog));
            }
        }

        tracing::debug!(
            "Bound item {} ({:?}) to {} surface, generation {}: {}",
            index,
            media_type,
            surface_id.as_str(),
            generation,
            item.url
        );
        self.bindings[surface_id.index()] = Some(binding);
    }

    /// Remove the binding on a surface: cancel its timers and unregister
    /// its event sink. Anything still in flight for it becomes stale.
    pub fn detach(&mut self, surface_id: SurfaceId, surface: &mut dyn Surface) {
        if let Some(mut binding) = self.bindings[surface_id.index()].take() {
            binding.cancel_all();
            // The unmute timer may have been cancelled with the rest.
            if binding.muted {
                surface.set_muted(false);
            }
            tracing::trace!(
                "Detached generation {} from {} surface",
                binding.generation,
                surface_id.as_str()
            );
        }
        surface.detach();
    }

    /// Interpret a lifecycle event from a surface.
    pub fn handle_surface_event(
        &mut self,
        surface_id: SurfaceId,
        generation: u64,
        event: SurfaceEvent,
        surface: &mut dyn Surface,
    ) -> Option<LoaderSignal> {
        let default_display = self.timings.image_duration();
        let Some(binding) = self.live_binding(surface_id, generation) else {
            tracing::trace!(
                "Dropping stale {:?} from {} surface (generation {})",
                event,
                surface_id.as_str(),
                generation
            );
            return None;
        };

        match event {
            SurfaceEvent::LoadStart => {
                tracing::trace!("Load started: {}", binding.item.url);
                None
            }
            SurfaceEvent::CanPlay => {
                if binding.phase == Phase::Loading && !binding.has_timer(TimerKind::ReadinessGrace) {
                    let grace = self.timings.readiness_grace();
                    let handle = self.timer(surface_id, generation, TimerKind::ReadinessGrace, grace);
                    if let Some(binding) = self.binding_mut(surface_id) {
                        binding.timers.push((TimerKind::ReadinessGrace, handle));
                    }
                }
                None
            }
            SurfaceEvent::CanPlayThrough => {
                Self::mark_ready(binding, surface, ReadinessGrade::FullyBuffered)
            }
            SurfaceEvent::PlayStarted => {
                if binding.play_attempts > 1 {
                    let delay = self.timings.unmute_delay();
                    let handle = self.timer(surface_id, generation, TimerKind::Unmute, delay);
                    if let Some(binding) = self.binding_mut(surface_id) {
                        binding.timers.push((TimerKind::Unmute, handle));
                    }
                }
                None
            }
            SurfaceEvent::PlayRejected(reason) => {
                if binding.play_attempts <= 1 {
                    tracing::warn!(
                        "Playback rejected for {} ({}), retrying muted",
                        binding.item.url, reason
                    );
                    surface.set_muted(true);
                    binding.muted = true;
                    let delay = self.timings.autoplay_retry();
                    let handle = self.timer(surface_id, generation, TimerKind::AutoplayRetry, delay);
                    if let Some(binding) = self.binding_mut(surface_id) {
                        binding.timers.push((TimerKind::AutoplayRetry, handle));
                    }
                    None
                } else {
                    Some(LoaderSignal::StartFailed {
                        index: binding.index,
                        item: binding.item.clone(),
                        reason,
                    })
                }
            }
            SurfaceEvent::Ended => {
                binding.finish();
                Some(LoaderSignal::Ended {
                    index: binding.index,
                    item: binding.item.clone(),
                })
            }
            SurfaceEvent::Error(fault) => Some(Self::fail(binding, fault.into())),
            SurfaceEvent::Stalled => Some(Self::fail(binding, MediaLoadError::Stalled)),
            SurfaceEvent::ImageLoaded => {
                if binding.phase != Phase::Loading {
                    return None;
                }
                binding.cancel_timer(TimerKind::ImageWatchdog);
                binding.phase = Phase::Ready;
                surface.show_image(&binding.item.url);

                let display = binding
                    .item
                    .duration
                    .map(Duration::from_millis)
                    .unwrap_or(default_display);
                let index = binding.index;
                let item = binding.item.clone();

                let handle = self.timer(surface_id, generation, TimerKind::ImageDisplay, display);
                if let Some(binding) = self.binding_mut(surface_id) {
                    binding.timers.push((TimerKind::ImageDisplay, handle));
                }
                Some(LoaderSignal::Ready {
                    index,
                    item,
                    grade: ReadinessGrade::FullyBuffered,
                })
            }
            SurfaceEvent::ImageFailed(reason) => {
                surface.clear();
                Some(Self::fail(binding, MediaLoadError::ImageFailed(reason)))
            }
        }
    }

    /// Handle an expired binding timer.
    pub fn handle_timer(
        &mut self,
        surface_id: SurfaceId,
        generation: u64,
        timer: TimerKind,
        surface: &mut dyn Surface,
    ) -> Option<LoaderSignal> {
        let watchdog = self.timings.image_watchdog();
        let Some(binding) = self.live_binding(surface_id, generation) else {
            tracing::trace!("Dropping stale {:?} timer for {} surface", timer, surface_id.as_str());
            return None;
        };
        binding.forget_timer(timer);

        match timer {
            TimerKind::ReadinessGrace => Self::mark_ready(binding, surface, ReadinessGrade::Playable),
            TimerKind::AutoplayRetry => {
                binding.play_attempts += 1;
                surface.play();
                None
            }
            TimerKind::Unmute => {
                binding.muted = false;
                surface.set_muted(false);
                None
            }
            TimerKind::ImageDisplay => {
                binding.finish();
                Some(LoaderSignal::Ended {
                    index: binding.index,
                    item: binding.item.clone(),
                })
            }
            TimerKind::ImageWatchdog => {
                if binding.phase != Phase::Loading {
                    return None;
                }
                surface.clear();
                Some(Self::fail(binding, MediaLoadError::WatchdogTimeout(watchdog)))
            }
        }
    }

    fn live_binding(&mut self, surface_id: SurfaceId, generation: u64) -> Option<&mut Binding> {
        self.bindings[surface_id.index()]
            .as_mut()
            .filter(|b| b.generation == generation && b.phase != Phase::Finished)
    }

    fn binding_mut(&mut self, surface_id: SurfaceId) -> Option<&mut Binding> {
        self.bindings[surface_id.index()].as_mut()
    }

    fn timer(&self, surface_id: SurfaceId, generation: u64, kind: TimerKind, delay: Duration) -> TimerHandle {
        self.scheduler.after(
            delay,
            PlayerEvent::Timer {
                surface: surface_id,
                generation,
                timer: kind,
            },
        )
    }

    fn mark_ready(
        binding: &mut Binding,
        surface: &mut dyn Surface,
        grade: ReadinessGrade,
    ) -> Option<LoaderSignal> {
        if binding.phase != Phase::Loading {
            return None;
        }
        binding.cancel_timer(TimerKind::ReadinessGrace);
        binding.phase = Phase::Ready;

        if binding.media_type == MediaType::Video {
            binding.play_attempts = 1;
            surface.play();
        }

        Some(LoaderSignal::Ready {
            index: binding.index,
            item: binding.item.clone(),
            grade,
        })
    }

    fn fail(binding: &mut Binding, error: MediaLoadError) -> LoaderSignal {
        binding.finish();
        LoaderSignal::Failed {
            index: binding.index,
            item: binding.item.clone(),
            error,
        }
    }
}
