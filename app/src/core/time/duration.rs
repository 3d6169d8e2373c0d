#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize)]
#[serde(transparent)]
pub struct Duration {
    #[serde(with = "duration_format")]
    pub(super) delegate: chrono::Duration,
}

impl Duration {
    pub(super) fn new(delegate: chrono::Duration) -> Self {
        Self { delegate }
    }

    pub fn hours(hours: i64) -> Self {
        Self::new(chrono::Duration::hours(hours))
    }

    pub fn minutes(minutes: i64) -> Self {
        Self::new(chrono::Duration::minutes(minutes))
    }

    pub fn seconds(seconds: i64) -> Self {
        Self::new(chrono::Duration::seconds(seconds))
    }
}

impl From<Duration> for std::time::Duration {
    fn from(val: Duration) -> Self {
        //negative durations make no sense for timers and cache TTLs
        std::time::Duration::from_millis(val.delegate.num_milliseconds().max(0) as u64)
    }
}

mod duration_format {
    use iso8601_duration::Duration as Iso8601Duration;
    use serde::{Deserializer, de::Visitor};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<chrono::Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = chrono::TimeDelta;

            fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                formatter.write_str("a string representing an ISO 8601 duration (e.g., PT30M)")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let iso_duration = Iso8601Duration::parse(value)
                    .map_err(|e| E::custom(format!("Error parsing {value} to duration: {e:?}")))?;

                iso_duration.to_chrono().ok_or_else(|| {
                    E::custom(format!(
                        "Duration too long. Must not contain years and/or months. Received {value}"
                    ))
                })
            }
        }

        deserializer.deserialize_str(DurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::t;

    #[test]
    fn test_deserialize_duration() {
        let duration = serde_json::from_str::<Duration>(r#""PT30M""#).unwrap();
        assert_eq!(duration, t!(30 minutes));
    }

    #[test]
    fn test_deserialize_duration_with_years_fails() {
        assert!(serde_json::from_str::<Duration>(r#""P1Y""#).is_err());
    }

    #[test]
    fn test_into_std_duration() {
        let duration: std::time::Duration = t!(2 minutes).into();
        assert_eq!(duration, std::time::Duration::from_secs(120));
    }
}
