//! Derived fields: age, time left and lifecycle tags.
//!
//! Everything here is a pure function of the record's instants, its status set
//! and a reference time supplied by the caller.

use crate::types::{DerivedFields, DomainRecord, StatusEntry};
use chrono::{DateTime, Duration, Utc};

/// A domain younger than this is tagged `new`.
pub const NEW_WINDOW_DAYS: i64 = 7;

/// A domain expiring within this many days is tagged `expiringSoon`.
pub const EXPIRING_SOON_DAYS: i64 = 7;

/// Compute derived fields.
///
/// `age` and `remaining` are absent without the matching instant. `remaining`
/// is signed: negative once the expiration instant has passed.
pub fn normalize(
    creation: Option<DateTime<Utc>>,
    expiration: Option<DateTime<Utc>>,
    status: &[StatusEntry],
    now: DateTime<Utc>,
) -> DerivedFields {
    let age = creation.map(|created| now - created);
    let remaining = expiration.map(|expires| expires - now);

    let has = |needle: &str| {
        status
            .iter()
            .any(|entry| entry.text.to_lowercase().contains(needle))
    };

    let pending_delete = has("pendingdelete");
    let redemption_period = has("redemptionperiod");
    // Only the literal `redemptionPeriod` code counts as redemption; a
    // registry's `redemptionGracePeriod` reads as a grace period.
    let grace_period = status.iter().any(|entry| {
        let text = entry.text.to_lowercase();
        text.contains("graceperiod") && !text.contains("redemptionperiod")
    });

    let new = age.is_some_and(|age| age < Duration::days(NEW_WINDOW_DAYS));
    let expiring_soon = remaining.is_some_and(|remaining| {
        remaining >= Duration::zero() && remaining < Duration::days(EXPIRING_SOON_DAYS)
    });
    let expired = remaining.is_some_and(|remaining| remaining < Duration::zero()) && !pending_delete;

    DerivedFields {
        age_seconds: age.map(|age| age.num_seconds()),
        remaining_seconds: remaining.map(|remaining| remaining.num_seconds()),
        pending_delete,
        grace_period,
        redemption_period,
        new,
        expiring_soon,
        expired,
    }
}

/// Recompute `record.derived` from the record's own dates and status.
pub fn normalize_record(record: &mut DomainRecord, now: DateTime<Utc>) {
    record.derived = normalize(
        record.creation_date.as_ref().and_then(|d| d.instant),
        record.expiration_date.as_ref().and_then(|d| d.instant),
        &record.status,
        now,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn status(codes: &[&str]) -> Vec<StatusEntry> {
        codes
            .iter()
            .map(|code| StatusEntry {
                text: code.to_string(),
                url: None,
            })
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_age_and_remaining() {
        let created = Utc.with_ymd_and_hms(1995, 8, 14, 4, 0, 0).unwrap();
        let expires = Utc.with_ymd_and_hms(2026, 8, 13, 4, 0, 0).unwrap();
        let derived = normalize(Some(created), Some(expires), &[], now());

        assert_eq!(derived.age_seconds, Some((now() - created).num_seconds()));
        assert_eq!(derived.remaining_seconds, Some((expires - now()).num_seconds()));
        assert!(derived.remaining().unwrap() > Duration::zero());
        assert!(!derived.new && !derived.expiring_soon && !derived.expired);
    }

    #[test]
    fn test_missing_instants() {
        let derived = normalize(None, None, &status(&["ok"]), now());
        assert!(derived.age_seconds.is_none());
        assert!(derived.remaining_seconds.is_none());
        assert!(!derived.expired);
    }

    #[test]
    fn test_redemption_period_after_expiry() {
        let expired = now() - Duration::days(40);
        let derived = normalize(None, Some(expired), &status(&["redemptionPeriod"]), now());
        assert!(derived.redemption_period);
        assert!(!derived.grace_period);
        assert!(derived.remaining_seconds.unwrap() < 0);
        assert!(derived.expired);
    }

    #[test]
    fn test_status_tags_case_insensitive() {
        let derived = normalize(
            None,
            None,
            &status(&["AUTORENEWPERIOD", "PendingDelete https://icann.org/epp#pendingDelete"]),
            now(),
        );
        assert!(!derived.grace_period);
        assert!(derived.pending_delete);

        let derived = normalize(None, None, &status(&["addGracePeriod"]), now());
        assert!(derived.grace_period);
    }

    #[test]
    fn test_redemption_grace_period_is_grace() {
        let derived = normalize(None, None, &status(&["redemptionGracePeriod"]), now());
        assert!(derived.grace_period);
        assert!(!derived.redemption_period);

        let derived = normalize(
            None,
            None,
            &status(&["redemptionGracePeriod", "redemptionPeriod"]),
            now(),
        );
        assert!(derived.grace_period);
        assert!(derived.redemption_period);
    }

    #[test]
    fn test_pending_delete_is_not_reported_expired() {
        let expired = now() - Duration::days(50);
        let derived = normalize(None, Some(expired), &status(&["pendingDelete"]), now());
        assert!(derived.pending_delete);
        assert!(!derived.expired);
    }

    #[test]
    fn test_windows() {
        let derived = normalize(
            Some(now() - Duration::days(2)),
            Some(now() + Duration::days(3)),
            &[],
            now(),
        );
        assert!(derived.new);
        assert!(derived.expiring_soon);

        let derived = normalize(
            Some(now() - Duration::days(7)),
            Some(now() + Duration::days(7)),
            &[],
            now(),
        );
        assert!(!derived.new);
        assert!(!derived.expiring_soon);
    }
}
