//! Display surfaces and the dual-surface crossfade.
//!
//! The host provides two [`Surface`]s. At any moment one is active (visible)
//! and the other inactive (being prepared off-screen). A crossfade fades the
//! inactive one in over the active one and then swaps their roles. The
//! surfaces themselves never move; only the role labels do.

use crate::config::Timings;
use crate::events::{CrossfadeStep, PlayerEvent, Scheduler, SurfaceEventSink, SurfaceId};
use std::time::Duration;

/// Visual state class applied to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Fully visible.
    Active,
    /// Present but transparent.
    Inactive,
    /// Fading towards visible.
    FadingIn,
    /// Fading towards transparent.
    FadingOut,
    /// Not rendered at all.
    Hidden,
}

/// Video-capable display region provided by the host.
///
/// Operations whose outcome is asynchronous (`load`, `play`,
/// `preload_image`) report back through the sink given to `attach`.
pub trait Surface {
    /// Start reporting lifecycle events through `sink`, replacing any previous sink.
    fn attach(&mut self, sink: SurfaceEventSink);
    /// Stop reporting lifecycle events.
    fn detach(&mut self);
    fn set_source(&mut self, url: &str);
    fn load(&mut self);
    /// Answered by `PlayStarted` or `PlayRejected`.
    fn play(&mut self);
    fn pause(&mut self);
    fn rewind(&mut self);
    fn set_muted(&mut self, muted: bool);
    /// Fetch an image off-surface. Answered by `ImageLoaded` or `ImageFailed`.
    fn preload_image(&mut self, url: &str);
    /// Show a previously pre-loaded image as the surface background.
    fn show_image(&mut self, url: &str);
    /// Drop the current source or background image.
    fn clear(&mut self);
    fn set_visibility(&mut self, visibility: Visibility);
}

/// Outcome of a crossfade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadeStart {
    Started,
    /// A crossfade was already running; the request was dropped.
    AlreadyInProgress,
}

/// Owns both surfaces and drives the crossfade between them.
pub struct DualSurfaceController {
    surfaces: [Box<dyn Surface>; 2],
    active: SurfaceId,
    transitioning: bool,
    settle_delay: Duration,
    fade_duration: Duration,
    scheduler: Scheduler,
}

impl DualSurfaceController {
    /// `primary` starts out active.
    pub fn new(
        primary: Box<dyn Surface>,
        secondary: Box<dyn Surface>,
        scheduler: Scheduler,
        timings: &Timings,
    ) -> Self {
        Self {
            surfaces: [primary, secondary],
            active: SurfaceId::Primary,
            transitioning: false,
            settle_delay: timings.crossfade_settle(),
            fade_duration: timings.crossfade_fade(),
            scheduler,
        }
    }

    pub fn active_id(&self) -> SurfaceId {
        self.active
    }

    pub fn inactive_id(&self) -> SurfaceId {
        self.active.other()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn surface_mut(&mut self, id: SurfaceId) -> &mut dyn Surface {
        self.surfaces[id.index()].as_mut()
    }

    /// Show the active surface and hide the inactive one, for the first item.
    pub fn show_initial(&mut self) {
        let active = self.active;
        self.surface_mut(active).set_visibility(Visibility::Active);
        self.surface_mut(active.other()).set_visibility(Visibility::Hidden);
    }

    /// Fade the inactive surface in over the active one.
    ///
    /// Completion is reported by [`step`](Self::step) once the scheduled
    /// `Finish` step arrives.
    pub fn crossfade(&mut self) -> CrossfadeStart {
        if self.transitioning {
            tracing::info!("Crossfade already in progress, ignoring request");
            return CrossfadeStart::AlreadyInProgress;
        }
        self.transitioning = true;

        let outgoing = self.active;
        self.surface_mut(outgoing).set_visibility(Visibility::FadingOut);
        self.surface_mut(outgoing.other()).set_visibility(Visibility::FadingIn);

        // Both timers start now, so Finish lands at settle + fade from the trigger.
        let _ = self
            .scheduler
            .after(self.settle_delay, PlayerEvent::Crossfade(CrossfadeStep::Settle));
        let _ = self.scheduler.after(
            self.settle_delay + self.fade_duration,
            PlayerEvent::Crossfade(CrossfadeStep::Finish),
        );

        tracing::debug!(
            "Crossfade started: {} -> {}",
            outgoing.as_str(),
            outgoing.other().as_str()
        );
        CrossfadeStart::Started
    }

    /// Apply a scheduled crossfade step.
    ///
    /// Returns the newly active surface when the crossfade completes.
    pub fn step(&mut self, step: CrossfadeStep) -> Option<SurfaceId> {
        if !self.transitioning {
            tracing::warn!("Crossfade step {:?} without a running crossfade", step);
            return None;
        }

        match step {
            CrossfadeStep::Settle => {
                let outgoing = self.active;
                self.surface_mut(outgoing).set_visibility(Visibility::Inactive);
                self.surface_mut(outgoing.other()).set_visibility(Visibility::Active);
                None
            }
            CrossfadeStep::Finish => {
                self.active = self.active.other();
                let outgoing = self.active.other();

                let surface = self.surface_mut(outgoing);
                surface.set_visibility(Visibility::Hidden);
                surface.pause();
                surface.rewind();
                surface.clear();

                self.transitioning = false;
                tracing::debug!("Crossfade complete, {} is active", self.active.as_str());
                Some(self.active)
            }
        }
    }
}
