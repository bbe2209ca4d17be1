//! Fake host used by the integration tests.

#![allow(dead_code)]

use kiosk_player::config::Timings;
use kiosk_player::event_log::{EventLog, LogEntry, LogKind, LogSink};
use kiosk_player::events::{PlayerEvent, Scheduler, SurfaceEvent, SurfaceEventSink, SurfaceId};
use kiosk_player::overlay::{DescriptionOverlay, FadeState, Overlay};
use kiosk_player::surface::{DualSurfaceController, Surface, Visibility};
use kiosk_player::{Player, Playlist};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Operation performed on a fake surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Attach(u64),
    Detach,
    SetSource(String),
    Load,
    Play,
    Pause,
    Rewind,
    Muted(bool),
    PreloadImage(String),
    ShowImage(String),
    Clear,
    Visibility(Visibility),
}

#[derive(Debug, Default)]
pub struct SurfaceState {
    pub ops: Vec<Op>,
    pub sink: Option<SurfaceEventSink>,
}

/// Surface that records every call and lets the test emit events.
#[derive(Clone, Default)]
pub struct FakeSurface(pub Arc<Mutex<SurfaceState>>);

impl FakeSurface {
    pub fn ops(&self) -> Vec<Op> {
        self.0.lock().unwrap().ops.clone()
    }

    pub fn count(&self, op: &Op) -> usize {
        self.0.lock().unwrap().ops.iter().filter(|o| *o == op).count()
    }

    pub fn clear_ops(&self) {
        self.0.lock().unwrap().ops.clear();
    }

    /// Emit through the currently attached sink. Panics if detached.
    pub fn emit(&self, event: SurfaceEvent) {
        let sink = self.0.lock().unwrap().sink.clone().expect("surface has no sink attached");
        assert!(sink.emit(event));
    }

    pub fn sink(&self) -> Option<SurfaceEventSink> {
        self.0.lock().unwrap().sink.clone()
    }

    fn record(&self, op: Op) {
        self.0.lock().unwrap().ops.push(op);
    }
}

impl Surface for FakeSurface {
    fn attach(&mut self, sink: SurfaceEventSink) {
        self.record(Op::Attach(sink.generation()));
        self.0.lock().unwrap().sink = Some(sink);
    }

    fn detach(&mut self) {
        self.record(Op::Detach);
        self.0.lock().unwrap().sink = None;
    }

    fn set_source(&mut self, url: &str) {
        self.record(Op::SetSource(url.to_string()));
    }

    fn load(&mut self) {
        self.record(Op::Load);
    }

    fn play(&mut self) {
        self.record(Op::Play);
    }

    fn pause(&mut self) {
        self.record(Op::Pause);
    }

    fn rewind(&mut self) {
        self.record(Op::Rewind);
    }

    fn set_muted(&mut self, muted: bool) {
        self.record(Op::Muted(muted));
    }

    fn preload_image(&mut self, url: &str) {
        self.record(Op::PreloadImage(url.to_string()));
    }

    fn show_image(&mut self, url: &str) {
        self.record(Op::ShowImage(url.to_string()));
    }

    fn clear(&mut self) {
        self.record(Op::Clear);
    }

    fn set_visibility(&mut self, visibility: Visibility) {
        self.record(Op::Visibility(visibility));
    }
}

#[derive(Clone, Default)]
pub struct FakeOverlay(pub Arc<Mutex<Vec<String>>>);

impl Overlay for FakeOverlay {
    fn set_text(&mut self, text: &str) {
        self.0.lock().unwrap().push(text.to_string());
    }

    fn set_fade(&mut self, _fade: FadeState) {}
}

#[derive(Clone, Default)]
pub struct MemorySink(pub Arc<Mutex<Vec<LogEntry>>>);

impl LogSink for MemorySink {
    fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        self.0.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// A player wired to fake surfaces, driven by hand.
pub struct Harness {
    pub player: Player,
    pub rx: mpsc::UnboundedReceiver<PlayerEvent>,
    pub scheduler: Scheduler,
    pub primary: FakeSurface,
    pub secondary: FakeSurface,
    pub overlay: FakeOverlay,
    pub log: MemorySink,
}

impl Harness {
    pub fn new() -> Self {
        let (scheduler, rx) = Scheduler::channel();
        let timings = Timings::default();
        let primary = FakeSurface::default();
        let secondary = FakeSurface::default();
        let overlay = FakeOverlay::default();
        let log = MemorySink::default();

        let surfaces = DualSurfaceController::new(
            Box::new(primary.clone()),
            Box::new(secondary.clone()),
            scheduler.clone(),
            &timings,
        );
        let player = Player::new(
            surfaces,
            DescriptionOverlay::new(Box::new(overlay.clone())),
            EventLog::new(Box::new(log.clone())),
            scheduler.clone(),
            &timings,
        );

        Self {
            player,
            rx,
            scheduler,
            primary,
            secondary,
            overlay,
            log,
        }
    }

    /// Build a harness and start it on the given playlist document.
    pub fn started(document: &str) -> Self {
        let mut harness = Self::new();
        let playlist = Playlist::parse(document.as_bytes()).unwrap();
        harness.player.start(playlist);
        harness
    }

    pub fn surface(&self, id: SurfaceId) -> &FakeSurface {
        match id {
            SurfaceId::Primary => &self.primary,
            SurfaceId::Secondary => &self.secondary,
        }
    }

    /// Emit an event from a surface and handle everything already queued.
    pub fn emit(&mut self, id: SurfaceId, event: SurfaceEvent) {
        self.surface(id).emit(event);
        self.pump();
    }

    /// Handle every event that is already queued, without advancing time.
    pub fn pump(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.player.handle(event);
        }
    }

    /// Handle events for `duration` of (paused) time.
    pub async fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.rx.recv()).await {
            self.player.handle(event);
        }
    }

    pub fn log_kinds(&self) -> Vec<LogKind> {
        self.log.0.lock().unwrap().iter().map(|e| e.level).collect()
    }

    pub fn log_count(&self, kind: LogKind) -> usize {
        self.log_kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn overlay_texts(&self) -> Vec<String> {
        self.overlay.0.lock().unwrap().clone()
    }
}
