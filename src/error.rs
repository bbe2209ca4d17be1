//! Error types for the player.
//!
//! Playlist errors are fatal to boot. Media errors never are: the player
//! turns every one of them into a skip to the next item.

use std::time::Duration;
use thiserror::Error;

/// Failure to produce a playable playlist at startup.
#[derive(Error, Debug)]
pub enum PlaylistError {
    /// The playlist document could not be read (network, HTTP status, or I/O).
    #[error("Failed to fetch playlist from {location}: {reason}")]
    FetchFailed { location: String, reason: String },

    /// The document was read but is not a valid playlist.
    #[error("Failed to parse playlist document: {0}")]
    ParseFailed(#[from] serde_json::Error),

    /// The document parsed but `playlist` is missing or has no items.
    #[error("Playlist is empty")]
    EmptyPlaylist,
}

/// Media error reported by a display surface, mirroring the HTML media error codes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFault {
    #[error("playback aborted")]
    Aborted,
    #[error("network error")]
    Network,
    #[error("decode error")]
    Decode,
    #[error("source not supported")]
    SourceNotSupported,
    #[error("unknown media error (code {0})")]
    Unknown(u16),
}

impl MediaFault {
    pub fn code(&self) -> &'static str {
        match self {
            MediaFault::Aborted => "ABORTED",
            MediaFault::Network => "NETWORK",
            MediaFault::Decode => "DECODE",
            MediaFault::SourceNotSupported => "SRC_NOT_SUPPORTED",
            MediaFault::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Anything that stops an item from being shown. Always recovered by skipping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaLoadError {
    #[error("media error: {0}")]
    Fault(MediaFault),

    /// The surface stopped receiving data, during load or mid-playback.
    #[error("playback stalled")]
    Stalled,

    #[error("image pre-load failed: {0}")]
    ImageFailed(String),

    #[error("image did not load within {0:?}")]
    WatchdogTimeout(Duration),
}

impl MediaLoadError {
    /// Short code recorded with VIDEO_ERROR log entries.
    pub fn code(&self) -> &'static str {
        match self {
            MediaLoadError::Fault(fault) => fault.code(),
            MediaLoadError::Stalled => "STALLED",
            MediaLoadError::ImageFailed(_) => "IMAGE_FAILED",
            MediaLoadError::WatchdogTimeout(_) => "WATCHDOG",
        }
    }
}

impl From<MediaFault> for MediaLoadError {
    fn from(fault: MediaFault) -> Self {
        MediaLoadError::Fault(fault)
    }
}
