//! Player event types and the timer scheduler.
//!
//! Everything the player reacts to arrives as a [`PlayerEvent`] on one
//! channel: lifecycle signals from display surfaces, expired timers, and
//! crossfade steps. The player handles them one at a time, so no two
//! handlers ever overlap.

use crate::error::MediaFault;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// One of the two display surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceId {
    Primary,
    Secondary,
}

impl SurfaceId {
    pub fn other(self) -> Self {
        match self {
            SurfaceId::Primary => SurfaceId::Secondary,
            SurfaceId::Secondary => SurfaceId::Primary,
        }
    }

    pub fn index(self) -> usize {
        match self {
            SurfaceId::Primary => 0,
            SurfaceId::Secondary => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceId::Primary => "primary",
            SurfaceId::Secondary => "secondary",
        }
    }
}

/// Lifecycle signal emitted by a display surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    LoadStart,
    /// Enough data to start playing, more buffering may follow.
    CanPlay,
    /// Enough data to play through without stalling.
    CanPlayThrough,
    PlayStarted,
    /// The host refused to start playback (usually autoplay policy).
    PlayRejected(String),
    Ended,
    Error(MediaFault),
    Stalled,
    ImageLoaded,
    ImageFailed(String),
}

/// Timers owned by a surface binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    ReadinessGrace,
    AutoplayRetry,
    Unmute,
    ImageDisplay,
    ImageWatchdog,
}

/// Scheduled phases of a crossfade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadeStep {
    /// Visual role swap.
    Settle,
    /// Role swap and reset of the outgoing surface.
    Finish,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Surface {
        surface: SurfaceId,
        generation: u64,
        event: SurfaceEvent,
    },
    Timer {
        surface: SurfaceId,
        generation: u64,
        timer: TimerKind,
    },
    Crossfade(CrossfadeStep),
    /// Deferred request to bind a playlist index.
    PlayItem(usize),
    Shutdown,
}

/// Handle through which a host reports events for one binding of a surface.
///
/// Every event is stamped with the binding's generation, so events from a
/// binding that has since been replaced are recognised and dropped.
#[derive(Debug, Clone)]
pub struct SurfaceEventSink {
    surface: SurfaceId,
    generation: u64,
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl SurfaceEventSink {
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Post an event. Returns false once the player has shut down.
    pub fn emit(&self, event: SurfaceEvent) -> bool {
        self.tx
            .send(PlayerEvent::Surface {
                surface: self.surface,
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// A pending timer. Dropping the handle leaves the timer running.
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    pub fn cancel(self) {
        self.abort.abort();
    }
}

/// Posts events onto the player channel, immediately or after a delay.
#[derive(Debug, Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl Scheduler {
    pub fn new(tx: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self { tx }
    }

    /// Create a scheduler together with the receiving end the player reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, event: PlayerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Player channel closed, dropping event");
        }
    }

    /// Post `event` after `delay`. Must be called from within a tokio runtime.
    pub fn after(&self, delay: Duration, event: PlayerEvent) -> TimerHandle {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
        TimerHandle {
            abort: task.abort_handle(),
        }
    }

    pub fn sink(&self, surface: SurfaceId, generation: u64) -> SurfaceEventSink {
        SurfaceEventSink {
            surface,
            generation,
            tx: self.tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_delay() {
        let (scheduler, mut rx) = Scheduler::channel();
        let start = tokio::time::Instant::now();
        let _timer = scheduler.after(Duration::from_millis(250), PlayerEvent::PlayItem(3));

        assert_eq!(rx.recv().await, Some(PlayerEvent::PlayItem(3)));
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (scheduler, mut rx) = Scheduler::channel();
        let timer = scheduler.after(Duration::from_millis(100), PlayerEvent::PlayItem(1));
        let _later = scheduler.after(Duration::from_millis(300), PlayerEvent::PlayItem(2));
        timer.cancel();

        assert_eq!(rx.recv().await, Some(PlayerEvent::PlayItem(2)));
    }

    #[test]
    fn sink_stamps_surface_and_generation() {
        let (scheduler, mut rx) = Scheduler::channel();
        let sink = scheduler.sink(SurfaceId::Secondary, 7);
        assert!(sink.emit(SurfaceEvent::Ended));
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::Surface {
                surface: SurfaceId::Secondary,
                generation: 7,
                event: SurfaceEvent::Ended,
            }
        );
        assert_eq!(SurfaceId::Secondary.other(), SurfaceId::Primary);
    }
}
