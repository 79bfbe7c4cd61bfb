//! Notification record shared by the socket relay and the polling store

use crate::error::ParseError;
use chrono::{Local, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Notification priority as shown by the extension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

impl Priority {
    /// Parse a priority name, `None` for anything unrecognized.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

/// Missing, null, non-string and unknown priorities all become `Info`.
fn lenient_priority<'de, D>(deserializer: D) -> Result<Priority, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(Priority::from_name)
        .unwrap_or_default())
}

/// What a producer submits: `{title, message, priority?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub message: String,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Priority,
}

impl NotificationRequest {
    pub fn new(title: impl Into<String>, message: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            priority,
        }
    }

    /// Parse a single JSON object. Producer-supplied `id` and `timestamp`
    /// fields are ignored.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Assign `id` and `timestamp`. This is the only way to obtain a
    /// [`Notification`].
    pub fn stamp(self, clock: &IdClock) -> Notification {
        Notification {
            title: self.title,
            message: self.message,
            priority: self.priority,
            id: clock.next_id(),
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
        }
    }
}

/// A stamped notification. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    title: String,
    message: String,
    priority: Priority,
    id: u64,
    timestamp: String,
}

impl Notification {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// RFC 3339 acceptance time with local offset.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

/// Hands out millisecond-epoch ids.
///
/// Ids are the current Unix time in milliseconds, bumped by one when two
/// stamps land in the same millisecond, so ids from one clock are strictly
/// increasing.
#[derive(Debug, Default)]
pub struct IdClock {
    last: AtomicU64,
}

impl IdClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        let now = epoch_millis();
        let previous = match self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            }) {
            Ok(prev) | Err(prev) => prev,
        };
        now.max(previous + 1)
    }
}

fn epoch_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Reply to a submission, on the socket and over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitResponse {
    Ok { id: u64 },
    Error { message: String },
}

impl SubmitResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
