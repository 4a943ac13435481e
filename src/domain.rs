use chrono::{DateTime, Duration, Local, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub const OFFLINE_TAG: &str = "offline";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(default, with = "timestamp")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub stop: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn open(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            stop: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.start.is_some() && self.stop.is_none()
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => Some(stop - start),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

impl Task {
    pub fn new(code: impl Into<String>, title: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            tags,
            bookings: Vec::new(),
        }
    }

    /// Display and filter label: code and title separated by one space.
    pub fn label(&self) -> String {
        format!("{} {}", self.code, self.title)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    pub fn is_running(&self) -> bool {
        self.bookings.last().is_some_and(Booking::is_open)
    }

    /// Returns a copy with a new open booking appended.
    pub fn started(&self, at: DateTime<Utc>) -> Self {
        let mut task = self.clone();
        task.bookings.push(Booking::open(at));
        task
    }

    /// Returns a copy whose open booking is closed at `at`, or `None` when the
    /// task is not running.
    pub fn stopped(&self, at: DateTime<Utc>) -> Option<Self> {
        if !self.is_running() {
            return None;
        }

        let mut task = self.clone();
        if let Some(booking) = task.bookings.last_mut() {
            booking.stop = Some(at);
        }
        Some(task)
    }
}

pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in input.split_whitespace() {
        if !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Current time truncated to whole seconds, the precision kept on disk.
pub fn clock_now() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn local_day(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn format_clock(timestamp: Option<DateTime<Utc>>) -> String {
    match timestamp {
        Some(timestamp) => timestamp.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "...".to_string(),
    }
}

/// RFC 3339 strings on disk, where an empty string means "unset".
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(timestamp) => {
                serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        DateTime::parse_from_rfc3339(raw)
            .map(|timestamp| Some(timestamp.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}
