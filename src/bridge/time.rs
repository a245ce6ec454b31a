use crate::model::value::{format_time, parse_time};
use crate::model::Value;
use chrono::{DateTime, Utc};
use std::fmt;

/// Script-side timestamp. An unparseable input yields an invalid
/// timestamp rather than an error; it converts back to explicit none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub Option<DateTime<Utc>>);

impl Timestamp {
    pub fn parse(s: &str) -> Self {
        Self(parse_time(s))
    }

    pub fn now() -> Self {
        Self(Some(Utc::now()))
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// Seconds since the Unix epoch, 0 when invalid.
    pub fn unix(&self) -> i64 {
        self.0.map(|t| t.timestamp()).unwrap_or_default()
    }

    /// Generic value rendition: a typed time, or null when invalid.
    pub fn to_value(&self) -> Value {
        match &self.0 {
            Some(t) => Value::Time(*t),
            None => Value::Null,
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(t: DateTime<Utc>) -> Self {
        Self(Some(t))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(t) => f.write_str(&format_time(t)),
            None => f.write_str("invalid time"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_and_render() {
        let ts = Timestamp::parse("2024-02-03T04:05:06+02:00");
        assert!(ts.is_valid());
        assert_eq!(ts.to_string(), "2024-02-03T02:05:06Z");
        assert_eq!(ts.unix(), Utc.with_ymd_and_hms(2024, 2, 3, 2, 5, 6).unwrap().timestamp());
        assert_eq!(
            ts.to_value(),
            Value::Time(Utc.with_ymd_and_hms(2024, 2, 3, 2, 5, 6).unwrap())
        );
    }

    #[test]
    fn test_invalid() {
        let ts = Timestamp::parse("yesterday");
        assert!(!ts.is_valid());
        assert_eq!(ts.unix(), 0);
        assert_eq!(ts.to_value(), Value::Null);
    }
}
