//! Shared types for cold-chain event records

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Accepted timestamp layouts, tried in order
const TIMESTAMP_FORMATS: [&str; 4] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// Layout used whenever a timestamp appears in a diagnostic
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a record timestamp in any of the accepted layouts.
///
/// Zoned values (`Z` or `+HH:MM`) are normalised to UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(zoned) = DateTime::parse_from_rfc3339(value) {
        return Some(zoned.naive_utc());
    }
    TIMESTAMP_FORMATS.iter().find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Render a timestamp the way diagnostics show it
#[inline]
pub fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(DISPLAY_FORMAT).to_string()
}

/// Check-in / check-out direction at a station
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
    /// Any token outside {in, out}, kept verbatim for diagnostics
    Unknown(String),
}

impl std::str::FromStr for Direction {
    type Err = std::convert::Infallible;

    /// Only the exact lowercase tokens are recognised
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "in" => Direction::In,
            "out" => Direction::Out,
            other => Direction::Unknown(other.to_string()),
        })
    }
}

impl Direction {
    pub fn as_str(&self) -> &str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        // Unknown tokens are preserved for the consistency check
        Ok(match raw.parse::<Direction>() {
            Ok(direction) => direction,
            Err(never) => match never {},
        })
    }
}

impl Serialize for Direction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct TimestampVisitor;

    impl Visitor<'_> for TimestampVisitor {
        type Value = NaiveDateTime;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a date-time string such as 2024-03-01 08:15:00")
        }

        fn visit_str<E>(self, value: &str) -> Result<NaiveDateTime, E>
        where
            E: de::Error,
        {
            parse_timestamp(value)
                .ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_str(TimestampVisitor)
}

fn serialize_timestamp<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&fmt_ts(ts))
}

/// One observation of a shipment crossing a station boundary.
///
/// Field names on the wire follow the record store columns
/// (`transportid`, `transportstation`, `datetime`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub company: String,
    #[serde(rename = "transportid")]
    pub transport_id: String,
    #[serde(rename = "transportstation")]
    pub station: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub direction: Direction,
    #[serde(
        rename = "datetime",
        deserialize_with = "deserialize_timestamp",
        serialize_with = "serialize_timestamp"
    )]
    pub timestamp: NaiveDateTime,
}

impl Event {
    pub fn new(
        key: &ShipmentKey,
        station: &str,
        direction: Direction,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            company: key.company.clone(),
            transport_id: key.transport_id.clone(),
            station: station.to_string(),
            category: None,
            direction,
            timestamp,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    /// Shipment this event belongs to
    pub fn key(&self) -> ShipmentKey {
        ShipmentKey::new(&self.company, &self.transport_id)
    }

    #[inline]
    pub fn belongs_to(&self, key: &ShipmentKey) -> bool {
        self.company == key.company && self.transport_id == key.transport_id
    }
}

/// Identity of one shipment: company + transport identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShipmentKey {
    pub company: String,
    pub transport_id: String,
}

impl ShipmentKey {
    pub fn new(company: &str, transport_id: &str) -> Self {
        Self { company: company.to_string(), transport_id: transport_id.to_string() }
    }
}

impl std::fmt::Display for ShipmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.company, self.transport_id)
    }
}
