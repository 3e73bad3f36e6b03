use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::farmers::validation::{check_embedded_patch, check_period, decode, timestamp};
use crate::models::farmer::{Fields, Membership};
use crate::store::StoreError;

/// Picks the membership in force at `now`.
///
/// Among memberships whose period covers `now`, the most recently updated one
/// wins. On equal `mi_date_updated` the later entry in collection order wins.
pub fn select_active(memberships: &[Membership], now: DateTime<Utc>) -> Option<&Membership> {
    memberships
        .iter()
        .filter(|m| m.covers(now))
        .fold(None, |best, m| match best {
            Some(b) if b.mi_date_updated > m.mi_date_updated => Some(b),
            _ => Some(m),
        })
}

/// Overwrites every patched field on a copy of `current` and re-stamps it.
pub fn apply_patch(
    current: &Membership,
    patch: &Fields,
    now: DateTime<Utc>,
) -> Result<Membership, StoreError> {
    check_embedded_patch(patch)?;

    let Value::Object(mut record) =
        serde_json::to_value(current).map_err(|e| StoreError::Corrupt(e.to_string()))?
    else {
        return Err(StoreError::Corrupt("membership is not an object".into()));
    };
    for (key, value) in patch {
        record.insert(key.clone(), value.clone());
    }
    record.insert("mi_date_updated".into(), timestamp(now));

    let updated: Membership = decode(record)?;
    check_period(&updated)?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::farmer::{store_now, RecordId};
    use chrono::Duration;
    use serde_json::json;

    fn membership(
        now: DateTime<Utc>,
        start: i64,
        end: i64,
        updated: DateTime<Utc>,
    ) -> Membership {
        Membership {
            id: RecordId::generate(),
            mi_start: now + Duration::days(start),
            mi_expiration: now + Duration::days(end),
            mi_date_updated: updated,
            fields: Fields::new(),
        }
    }

    #[test]
    fn test_most_recently_updated_covering_membership_wins() {
        let t = store_now();
        let t1 = t - Duration::hours(2);
        let t2 = t - Duration::hours(1);
        let m1 = membership(t, -10, 10, t1);
        let m2 = membership(t, -5, 5, t2);
        let memberships = vec![m2.clone(), m1];

        assert_eq!(select_active(&memberships, t), Some(&m2));
    }

    #[test]
    fn test_expired_and_future_memberships_are_ignored() {
        let t = store_now();
        let memberships = vec![
            membership(t, -30, -1, t),
            membership(t, 1, 30, t + Duration::hours(1)),
        ];
        assert_eq!(select_active(&memberships, t), None);
        assert_eq!(select_active(&[], t), None);
    }

    #[test]
    fn test_equal_update_times_pick_last_scanned() {
        let t = store_now();
        let a = membership(t, -1, 1, t);
        let b = membership(t, -2, 2, t);
        let memberships = vec![a, b.clone()];
        assert_eq!(select_active(&memberships, t).map(|m| m.id), Some(b.id));
    }

    #[test]
    fn test_apply_patch_overwrites_fields_and_restamps() {
        let t = store_now();
        let current = membership(t, -1, 1, t - Duration::days(3));
        let patch = json!({"mi_expiration": "2099-01-01T00:00:00Z", "mi_fee": 1500});

        let updated = apply_patch(&current, patch.as_object().unwrap(), t).unwrap();
        assert_eq!(updated.id, current.id);
        assert_eq!(updated.mi_start, current.mi_start);
        assert_eq!(updated.mi_expiration.to_rfc3339(), "2099-01-01T00:00:00+00:00");
        assert_eq!(updated.fields.get("mi_fee"), Some(&json!(1500)));
        assert_eq!(updated.mi_date_updated, t);
    }

    #[test]
    fn test_apply_patch_rejects_bad_values() {
        let t = store_now();
        let current = membership(t, -1, 1, t);

        let reversed = json!({"mi_start": "2099-01-01T00:00:00Z"});
        assert!(apply_patch(&current, reversed.as_object().unwrap(), t).is_err());

        let id_change = json!({"_id": RecordId::generate()});
        assert!(apply_patch(&current, id_change.as_object().unwrap(), t).is_err());

        let not_a_date = json!({"mi_expiration": 5});
        assert!(matches!(
            apply_patch(&current, not_a_date.as_object().unwrap(), t),
            Err(StoreError::Validation(_))
        ));
    }
}
