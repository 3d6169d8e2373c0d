use std::{
    fmt::Display,
    ops::{Add, Sub},
};

use anyhow::Context;
use chrono::Timelike;
use chrono_tz::Tz;
use tokio::task_local;

use super::Duration;

task_local! {
    pub static FIXED_NOW: DateTime;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DateTime {
    delegate: chrono::DateTime<chrono::Utc>,
}

impl DateTime {
    fn new<T: chrono::TimeZone>(delegate: chrono::DateTime<T>) -> Self {
        Self {
            delegate: delegate.with_timezone(&chrono::Utc),
        }
    }

    pub fn now() -> Self {
        FIXED_NOW
            .try_with(|t| *t)
            .unwrap_or_else(|_| chrono::Utc::now().into())
    }

    pub fn from_iso(iso8601: &str) -> anyhow::Result<Self> {
        Ok(chrono::DateTime::parse_from_rfc3339(iso8601)?.into())
    }

    /// Accepts RFC 3339 timestamps and plain dates, the latter at midnight UTC.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.into());
        }

        let date = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("Error parsing timestamp {raw}"))?;
        Ok(date.and_time(chrono::NaiveTime::MIN).and_utc().into())
    }

    pub fn from_timestamp(secs: i64) -> Option<Self> {
        chrono::DateTime::from_timestamp(secs, 0).map(Into::into)
    }

    pub fn to_iso_string(&self) -> String {
        self.delegate.to_rfc3339()
    }

    /// Wall-clock hour (0-23) of this instant in the given timezone.
    pub fn hour_in(&self, tz: &Tz) -> u32 {
        self.delegate.with_timezone(tz).hour()
    }

    /// Calendar date of this instant in the given timezone.
    pub fn date_in(&self, tz: &Tz) -> chrono::NaiveDate {
        self.delegate.with_timezone(tz).date_naive()
    }

    pub fn elapsed_since(&self, since: Self) -> Duration {
        Duration::new(self.delegate - since.delegate)
    }
}

impl Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.delegate.to_rfc3339())
    }
}

impl Add<Duration> for DateTime {
    type Output = DateTime;

    fn add(self, rhs: Duration) -> Self::Output {
        Self::new(self.delegate + rhs.delegate)
    }
}

impl Sub<Duration> for DateTime {
    type Output = DateTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self::new(self.delegate - rhs.delegate)
    }
}

impl<T: chrono::TimeZone> From<chrono::DateTime<T>> for DateTime {
    fn from(val: chrono::DateTime<T>) -> Self {
        DateTime::new(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_in_london_winter() {
        let dt = DateTime::from_iso("2024-12-01T03:30:00Z").unwrap();

        assert_eq!(dt.hour_in(&chrono_tz::Europe::London), 3);
    }

    #[test]
    fn test_hour_in_london_summer() {
        //BST is UTC+1
        let dt = DateTime::from_iso("2024-07-01T06:30:00Z").unwrap();

        assert_eq!(dt.hour_in(&chrono_tz::Europe::London), 7);
    }

    #[test]
    fn test_date_in_timezone() {
        let dt = DateTime::from_iso("2024-07-01T23:30:00Z").unwrap();

        assert_eq!(
            dt.date_in(&chrono_tz::Europe::London),
            chrono::NaiveDate::from_ymd_opt(2024, 7, 2).unwrap()
        );
    }

    #[test]
    fn test_iso_roundtrip_keeps_instant() {
        let dt = DateTime::from_iso("2024-11-03T16:23:46+01:00").unwrap();

        assert_eq!(dt, DateTime::from_iso("2024-11-03T15:23:46Z").unwrap());
    }

    #[test]
    fn test_parse_plain_date() {
        let dt = DateTime::parse("2024-03-01").unwrap();

        assert_eq!(dt, DateTime::from_iso("2024-03-01T00:00:00Z").unwrap());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(DateTime::parse("yesterday-ish").is_err());
    }

    #[tokio::test]
    async fn test_fixed_now() {
        let fake_now = DateTime::from_iso("2024-11-03T15:23:46Z").unwrap();

        let now = FIXED_NOW.scope(fake_now, async { DateTime::now() }).await;

        assert_eq!(now, fake_now);
    }
}
