//! Looping kiosk media player.
//!
//! Cycles through a playlist of videos and images on two overlapping display
//! surfaces, crossfading between them so load latency stays hidden. The
//! display host is abstracted behind [`surface::Surface`] and
//! [`overlay::Overlay`]; everything the player reacts to arrives as a
//! [`events::PlayerEvent`].

pub mod config;
pub mod error;
pub mod event_log;
pub mod events;
pub mod headless;
pub mod media;
pub mod overlay;
pub mod player;
pub mod playlist;
pub mod surface;

pub use config::{Settings, Timings};
pub use error::{MediaFault, MediaLoadError, PlaylistError};
pub use event_log::{EventLog, LogEntry, LogKind, LogSink};
pub use events::{PlayerEvent, Scheduler, SurfaceEvent, SurfaceId};
pub use player::{PlaybackState, Player};
pub use playlist::{MediaType, Playlist, PlaylistCursor, PlaylistItem, PlaylistLoader, PlaylistSource};
