//! Lifecycle status derivation.
//!
//! A match's status is never edited directly; it is a pure function of the
//! clock and the match's configured windows, recomputed lazily on every
//! read. The resolver is idempotent: the same instant always yields the same
//! status, and callers persist only when the stored value actually changes.

use chrono::{DateTime, Utc};

use crate::models::{Match, MatchStatus, MatchType};

/// Derive the lifecycle status of `m` at instant `now`.
///
/// Rules, in order: past the end time the match is finished; inside the play
/// window it is ongoing; before kickoff the registration window decides
/// between registering, pending (window closed) and upcoming (window not yet
/// open), with registering as the fallback when no window is configured.
///
/// A friendly whose clock says ongoing but that never found an opponent is
/// reported as registering, since it cannot be in progress with one side.
///
/// Without both a start and an end time no time-driven transition is
/// possible and the stored status is returned unchanged.
pub fn resolve(m: &Match, now: DateTime<Utc>) -> MatchStatus {
    let (start, end) = match (m.start_time, m.end_time) {
        (Some(start), Some(end)) => (start, end),
        _ => return m.status,
    };

    let mut status = if now > end {
        MatchStatus::Finished
    } else if now >= start {
        MatchStatus::Ongoing
    } else {
        match (m.registration_start_time, m.registration_end_time) {
            (Some(open), Some(close)) => {
                if now >= open && now <= close {
                    MatchStatus::Registering
                } else if now > close {
                    MatchStatus::Pending
                } else {
                    MatchStatus::Upcoming
                }
            }
            _ => MatchStatus::Registering,
        }
    };

    if m.match_type == MatchType::TeamFriendly
        && status == MatchStatus::Ongoing
        && m.away_team_id.is_none()
    {
        status = MatchStatus::Registering;
    }

    status
}

/// Recompute and store the status; returns whether it changed so callers
/// persist at most once per resolution.
pub fn apply(m: &mut Match, now: DateTime<Utc>) -> bool {
    let status = resolve(m, now);
    if status != m.status {
        m.status = status;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchType;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn scheduled_match(match_type: MatchType) -> Match {
        Match::new(
            "Test Match".to_string(),
            match_type,
            "North Field".to_string(),
            "u1".into(),
            2,
            ts("2026-05-01T00:00:00Z"),
        )
        .with_schedule(ts("2026-05-10T14:00:00Z"), ts("2026-05-10T16:00:00Z"))
        .with_registration_window(ts("2026-05-01T00:00:00Z"), ts("2026-05-09T00:00:00Z"))
    }

    #[test]
    fn test_finished_after_end() {
        let m = scheduled_match(MatchType::Pickup);
        assert_eq!(resolve(&m, ts("2026-05-10T16:00:01Z")), MatchStatus::Finished);
    }

    #[test]
    fn test_ongoing_inside_window() {
        let m = scheduled_match(MatchType::Pickup);
        assert_eq!(resolve(&m, ts("2026-05-10T14:00:00Z")), MatchStatus::Ongoing);
        assert_eq!(resolve(&m, ts("2026-05-10T15:00:00Z")), MatchStatus::Ongoing);
        assert_eq!(resolve(&m, ts("2026-05-10T16:00:00Z")), MatchStatus::Ongoing);
    }

    #[test]
    fn test_registering_inside_registration_window() {
        let m = scheduled_match(MatchType::Pickup);
        assert_eq!(
            resolve(&m, ts("2026-05-05T12:00:00Z")),
            MatchStatus::Registering
        );
    }

    #[test]
    fn test_pending_between_close_and_kickoff() {
        let m = scheduled_match(MatchType::Pickup);
        assert_eq!(resolve(&m, ts("2026-05-09T12:00:00Z")), MatchStatus::Pending);
    }

    #[test]
    fn test_upcoming_before_window_opens() {
        let m = scheduled_match(MatchType::Pickup);
        assert_eq!(
            resolve(&m, ts("2026-04-30T12:00:00Z")),
            MatchStatus::Upcoming
        );
    }

    #[test]
    fn test_no_window_falls_back_to_registering() {
        let mut m = scheduled_match(MatchType::Pickup);
        m.registration_start_time = None;
        m.registration_end_time = None;
        assert_eq!(
            resolve(&m, ts("2026-05-05T12:00:00Z")),
            MatchStatus::Registering
        );
    }

    #[test]
    fn test_missing_schedule_leaves_status_unchanged() {
        let mut m = scheduled_match(MatchType::Pickup);
        m.start_time = None;
        m.status = MatchStatus::Pending;
        assert_eq!(resolve(&m, ts("2026-05-05T12:00:00Z")), MatchStatus::Pending);
    }

    #[test]
    fn test_friendly_without_opponent_never_ongoing() {
        let m = scheduled_match(MatchType::TeamFriendly);
        assert_eq!(
            resolve(&m, ts("2026-05-10T15:00:00Z")),
            MatchStatus::Registering
        );
    }

    #[test]
    fn test_friendly_with_opponent_goes_ongoing() {
        let mut m = scheduled_match(MatchType::TeamFriendly);
        m.away_team_id = Some("t2".into());
        assert_eq!(resolve(&m, ts("2026-05-10T15:00:00Z")), MatchStatus::Ongoing);
    }

    #[test]
    fn test_friendly_without_opponent_still_finishes() {
        let m = scheduled_match(MatchType::TeamFriendly);
        assert_eq!(
            resolve(&m, ts("2026-05-10T17:00:00Z")),
            MatchStatus::Finished
        );
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut m = scheduled_match(MatchType::Pickup);
        let now = ts("2026-05-09T12:00:00Z");

        assert!(apply(&mut m, now));
        assert_eq!(m.status, MatchStatus::Pending);

        // Second application at the same instant writes nothing
        assert!(!apply(&mut m, now));
        assert_eq!(m.status, MatchStatus::Pending);
    }
}
