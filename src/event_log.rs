//! Append-only playback event log.
//!
//! Entries are mirrored to `tracing` and handed to a [`LogSink`], by default
//! one JSON line per entry in a daily file. Writing the log never interrupts
//! playback: sink failures are only warned about.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Kind of event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    Info,
    Error,
    VideoError,
    VideoChange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Destination for event log entries.
pub trait LogSink: Send {
    fn append(&mut self, entry: &LogEntry) -> io::Result<()>;
}

/// Key used to suppress repeated VIDEO_CHANGE entries.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChangeKey {
    from: String,
    to: String,
    index: usize,
}

/// Session-owned event log.
pub struct EventLog {
    sink: Option<Box<dyn LogSink>>,
    last_change: Option<ChangeKey>,
}

impl EventLog {
    pub fn new(sink: Box<dyn LogSink>) -> Self {
        Self {
            sink: Some(sink),
            last_change: None,
        }
    }

    /// Log to `tracing` only.
    pub fn tracing_only() -> Self {
        Self {
            sink: None,
            last_change: None,
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.append(LogKind::Info, message, None, None);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.append(LogKind::Error, message, None, None);
    }

    pub fn video_error(&mut self, message: impl Into<String>, url: &str, code: &str) {
        let message = message.into();
        tracing::error!("Video error [{}] {}: {}", code, url, message);
        self.append(
            LogKind::VideoError,
            message,
            Some(url.to_string()),
            Some(code.to_string()),
        );
    }

    /// Record a move from one item to another.
    ///
    /// Returns false, writing nothing, if the same change was the last one logged.
    pub fn video_change(&mut self, from: &str, to: &str, index: usize) -> bool {
        let key = ChangeKey {
            from: from.to_string(),
            to: to.to_string(),
            index,
        };
        if self.last_change.as_ref() == Some(&key) {
            tracing::debug!("Suppressing repeated change {} -> {} ({})", from, to, index);
            return false;
        }
        self.last_change = Some(key);

        let message = format!("Change from {} to {} at index {}", from, to, index);
        tracing::info!("{}", message);
        self.append(LogKind::VideoChange, message, None, None);
        true
    }

    fn append(&mut self, level: LogKind, message: String, url: Option<String>, code: Option<String>) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message,
            url,
            code,
        };
        if let Err(e) = sink.append(&entry) {
            tracing::warn!("Failed to write event log entry: {}", e);
        }
    }
}

/// Writes JSON lines to `<dir>/player-YYYY-MM-DD.log`.
pub struct DailyFileSink {
    dir: PathBuf,
}

impl DailyFileSink {
    /// Create the log directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("player-{}.log", date.format("%Y-%m-%d")))
    }

    /// Delete daily files more than `retention_days` days older than `today`.
    pub fn prune(&self, today: NaiveDate, retention_days: u32) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(date) = Self::date_of(&path) else {
                continue;
            };
            if (today - date).num_days() > i64::from(retention_days) {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        tracing::debug!("Removed old event log {:?}", path);
                        removed += 1;
                    }
                    Err(e) => tracing::warn!("Failed to remove old event log {:?}: {}", path, e),
                }
            }
        }
        Ok(removed)
    }

    fn date_of(path: &Path) -> Option<NaiveDate> {
        let name = path.file_name()?.to_str()?;
        let date = name.strip_prefix("player-")?.strip_suffix(".log")?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }
}

impl LogSink for DailyFileSink {
    fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        let path = self.file_for(entry.timestamp.date_naive());
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())
    }
}
