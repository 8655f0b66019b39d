use super::intent::{Intent, IntentSource};
use crate::imaging::RecorderError;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use strum_macros::Display;

/// Everything the session loop consumes from its queue.
#[derive(Debug)]
pub enum SessionEvent {
    Intent(IntentSource, Intent),
    /// Result of a background compression pass started when a recording ended.
    CompressionFinished(Result<PathBuf, RecorderError>),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible message published by the session.
#[derive(Debug, Clone)]
pub struct Notice {
    level: NoticeLevel,
    text: String,
    timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self { level, text: text.into(), timestamp: Utc::now() }
    }

    pub fn level(&self) -> NoticeLevel { self.level }
    pub fn text(&self) -> &str { &self.text }
    pub fn timestamp(&self) -> DateTime<Utc> { self.timestamp }
}
