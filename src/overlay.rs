//! Description text shown over the playing item.

use crate::playlist::PlaylistItem;

/// Fade class of the description region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeState {
    FadeIn,
    FadeOut,
}

/// Text-bearing region provided by the host.
pub trait Overlay {
    fn set_text(&mut self, text: &str);
    fn set_fade(&mut self, fade: FadeState);
}

/// Keeps the description region in step with the visible item.
pub struct DescriptionOverlay {
    target: Box<dyn Overlay>,
    text: String,
    visible: bool,
}

impl DescriptionOverlay {
    pub fn new(target: Box<dyn Overlay>) -> Self {
        Self {
            target,
            text: String::new(),
            visible: true,
        }
    }

    /// Show the description of the item at `index`, or "Video N" if it has none.
    pub fn update(&mut self, item: &PlaylistItem, index: usize) {
        self.text = match item.description.as_deref() {
            Some(description) if !description.is_empty() => description.to_string(),
            _ => format!("Video {}", index + 1),
        };
        self.target.set_text(&self.text);
        self.target.set_fade(FadeState::FadeIn);
        self.visible = true;
    }

    pub fn hide(&mut self) {
        if self.visible {
            self.target.set_fade(FadeState::FadeOut);
            self.visible = false;
        }
    }

    pub fn show(&mut self) {
        if !self.visible {
            self.target.set_fade(FadeState::FadeIn);
            self.visible = true;
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}
