//! Serde helpers for backend timestamps.
//!
//! The backend stores naive UTC datetimes and emits them without an offset
//! (`2025-12-01T09:30:00.123456`).  Offsets are accepted when present; naive
//! values are read as UTC.  Values are always written as RFC 3339.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Parse a backend timestamp, with or without an offset.
pub fn parse(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
    if let Ok(datetime) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(datetime);
    }
    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(s, naive).map(PrimitiveDateTime::assume_utc)
}

/// Deserialize a backend timestamp into an OffsetDateTime
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(serde::de::Error::custom)
}

/// Serialize an OffsetDateTime into an RFC 3339 formatted string
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

/// The same conventions for optional timestamps.
pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    /// Deserialize an optional backend timestamp.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => super::parse(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }

    /// Serialize an optional timestamp; `None` becomes `null`.
    pub fn serialize<S>(datetime: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match datetime {
            Some(datetime) => super::serialize(datetime, serializer),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_naive_backend_timestamps_as_utc() {
        let parsed = parse("2025-12-01T09:30:00.123456").unwrap();
        assert_eq!(parsed.date(), datetime!(2025-12-01 09:30 UTC).date());
        assert_eq!(parsed.offset(), time::UtcOffset::UTC);
        assert_eq!(parsed.hour(), 9);
        assert_eq!(parsed.minute(), 30);
    }

    #[test]
    fn parses_naive_timestamps_without_fraction() {
        let parsed = parse("2025-12-01T09:30:00").unwrap();
        assert_eq!(parsed, datetime!(2025-12-01 09:30 UTC));
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse("2025-12-01T09:30:00+02:00").unwrap();
        assert_eq!(parsed, datetime!(2025-12-01 07:30 UTC));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("yesterday").is_err());
    }
}
