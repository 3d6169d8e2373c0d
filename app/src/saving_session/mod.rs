use serde::Serialize;

use crate::core::time::DateTime;
use crate::eonnext::SavingSession;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total: usize,
    pub active_count: usize,
    pub upcoming_count: usize,
    pub sessions: Vec<SessionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEntry {
    pub id: String,
    pub start: Option<DateTime>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Active,
    Upcoming,
    Other,
}

fn state_of(session: &SavingSession, now: DateTime) -> SessionState {
    match (session.start, session.end) {
        (None, _) => SessionState::Other,
        (Some(start), _) if start > now => SessionState::Upcoming,
        (Some(_), Some(end)) if now <= end => SessionState::Active,
        _ => SessionState::Other,
    }
}

/// Counts active and upcoming sessions at `now`. Every session is listed, counted or not.
pub fn classify(sessions: &[SavingSession], now: DateTime) -> SessionSummary {
    let states: Vec<_> = sessions.iter().map(|s| state_of(s, now)).collect();
    let active_count = states.iter().filter(|s| **s == SessionState::Active).count();
    let upcoming_count = states.iter().filter(|s| **s == SessionState::Upcoming).count();

    SessionSummary {
        total: active_count + upcoming_count,
        active_count,
        upcoming_count,
        sessions: sessions
            .iter()
            .map(|s| SessionEntry {
                id: s.id.clone(),
                start: s.start,
                kind: s.kind.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    use super::*;
    use crate::t;

    fn session(id: &str, start: Option<DateTime>, end: Option<DateTime>) -> SavingSession {
        SavingSession {
            id: id.to_owned(),
            kind: Some("SAVING_SESSION".to_owned()),
            start,
            end,
        }
    }

    #[test]
    fn test_empty_sessions() {
        let summary = classify(&[], t!(now));

        assert_json_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({
                "total": 0,
                "active_count": 0,
                "upcoming_count": 0,
                "sessions": []
            })
        );
    }

    #[test]
    fn test_active_upcoming_and_past() {
        let now = t!(now);
        let sessions = vec![
            session("active", Some(now - t!(1 hours)), Some(now + t!(1 hours))),
            session("upcoming", Some(now + t!(2 hours)), Some(now + t!(3 hours))),
            session("past", Some(now - t!(5 hours)), Some(now - t!(1 hours))),
        ];

        let summary = classify(&sessions, now);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.active_count, 1);
        assert_eq!(summary.upcoming_count, 1);
        assert_eq!(
            summary.sessions.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["active", "upcoming", "past"]
        );
    }

    #[test]
    fn test_session_bounds_are_inclusive() {
        let now = t!(now);
        let sessions = vec![
            session("starts-now", Some(now), Some(now + t!(1 hours))),
            session("ends-now", Some(now - t!(1 hours)), Some(now)),
        ];

        let summary = classify(&sessions, now);

        assert_eq!(summary.active_count, 2);
        assert_eq!(summary.upcoming_count, 0);
    }

    #[test]
    fn test_session_without_start_is_listed_but_not_counted() {
        let now = t!(now);
        let sessions = vec![session("no-start", None, Some(now + t!(1 hours)))];

        let summary = classify(&sessions, now);

        assert_eq!(summary.total, 0);
        assert_eq!(summary.sessions.len(), 1);
    }

    #[test]
    fn test_started_session_without_end_is_not_active() {
        let now = t!(now);
        let sessions = vec![session("open", Some(now - t!(10 minutes)), None)];

        let summary = classify(&sessions, now);

        assert_eq!(summary.active_count, 0);
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn test_upcoming_session_without_end() {
        let now = t!(now);
        let sessions = vec![session("later", Some(now + t!(30 minutes)), None)];

        assert_eq!(classify(&sessions, now).upcoming_count, 1);
    }

    #[test]
    fn test_serialized_entries() {
        let now = DateTime::from_iso("2024-11-20T17:00:00Z").unwrap();
        let sessions = vec![
            session("42", Some(DateTime::from_iso("2024-11-21T17:30:00Z").unwrap()), None),
            SavingSession {
                id: "43".to_owned(),
                kind: None,
                start: None,
                end: None,
            },
        ];

        let summary = classify(&sessions, now);

        assert_json_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({
                "total": 1,
                "active_count": 0,
                "upcoming_count": 1,
                "sessions": [
                    { "id": "42", "start": "2024-11-21T17:30:00Z", "type": "SAVING_SESSION" },
                    { "id": "43", "start": null, "type": null }
                ]
            })
        );
    }
}
