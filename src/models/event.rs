//! Event data structures.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::get_domain;

/// An absolute, canonical URL of one event's detail page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventLink(String);

impl EventLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bytes of one fetched calendar file and the variant URL that served them.
#[derive(Debug, Clone)]
pub struct RawCalendarBlob {
    pub variant_url: String,
    pub body: String,
}

/// Start or end of an event, preserving how the source expressed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    /// All-day (`VALUE=DATE`)
    Date(NaiveDate),
    /// `...Z`
    DateTimeUtc(DateTime<Utc>),
    /// No zone information
    DateTimeFloating(NaiveDateTime),
    /// `TZID=...`
    DateTimeZoned {
        datetime: NaiveDateTime,
        tzid: String,
    },
}

impl EventTime {
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    pub fn tzid(&self) -> Option<&str> {
        match self {
            Self::DateTimeZoned { tzid, .. } => Some(tzid),
            _ => None,
        }
    }

    /// Instant used for ordering.
    ///
    /// Dates sort at midnight and floating times as if they were UTC. Zoned
    /// times go through the IANA database; an unknown TZID is treated as UTC.
    pub fn sort_key(&self) -> DateTime<Utc> {
        match self {
            Self::Date(d) => d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
            Self::DateTimeUtc(dt) => *dt,
            Self::DateTimeFloating(naive) => naive.and_utc(),
            Self::DateTimeZoned { datetime, tzid } => match tzid.parse::<chrono_tz::Tz>() {
                Ok(tz) => match tz.from_local_datetime(datetime).earliest() {
                    Some(dt) => dt.with_timezone(&Utc),
                    None => skipped_local_to_utc(&tz, datetime),
                },
                Err(_) => datetime.and_utc(),
            },
        }
    }
}

/// Resolve a local time skipped by a forward transition using the offset in
/// force before the gap.
fn skipped_local_to_utc(tz: &chrono_tz::Tz, datetime: &NaiveDateTime) -> DateTime<Utc> {
    let offset_secs = datetime
        .checked_sub_signed(Duration::days(1))
        .and_then(|before| tz.offset_from_local_datetime(&before).earliest())
        .map(|offset| offset.fix().local_minus_utc())
        .unwrap_or(0);
    datetime
        .checked_sub_signed(Duration::seconds(offset_secs.into()))
        .unwrap_or(*datetime)
        .and_utc()
}

/// A VTIMEZONE definition carried over verbatim from a source calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimezoneDefinition {
    pub tzid: String,
    /// Unfolded lines from `BEGIN:VTIMEZONE` to `END:VTIMEZONE`
    pub lines: Vec<String>,
}

/// An `X-` property kept as the source wrote it.
///
/// Names may repeat; order and parameters are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProperty {
    pub name: String,
    #[serde(default)]
    pub params: Vec<(String, String)>,
    /// Raw value, still in its wire escaping
    pub value: String,
}

impl CustomProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// An enriched event ready for merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Deduplication key
    pub uid: String,

    pub summary: String,

    pub start: EventTime,

    #[serde(default)]
    pub end: Option<EventTime>,

    #[serde(default)]
    pub location: Option<String>,

    /// Event detail page this was acquired from
    pub source_url: String,

    /// Plain text scraped from the event page, possibly empty
    #[serde(default)]
    pub description: String,

    /// When the calendar body was fetched; the newest wins on UID collision
    pub fetched_at: DateTime<Utc>,

    /// `X-` properties passed through unchanged
    #[serde(default)]
    pub custom_properties: Vec<CustomProperty>,

    /// Definitions for any TZID used by this event
    #[serde(default)]
    pub timezones: Vec<TimezoneDefinition>,
}

impl Event {
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }
}

/// Build a stable UID for an event whose calendar file carries none.
pub fn synthesize_uid(event_url: &str) -> String {
    let digest = hex::encode(Sha256::digest(event_url.as_bytes()));
    let host = get_domain(event_url).unwrap_or_else(|| "ics-aggregator".to_string());
    format!("{}@{}", &digest[..16], host)
}
