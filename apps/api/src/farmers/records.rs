//! Record access layer: one function per Farmer operation.
//!
//! Each function performs at most one read and one write against the store
//! and maps "nothing there" to `AppError::NotFound`. Status mapping for every
//! other failure happens in `errors::classify`.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::farmers::membership::{apply_patch, select_active};
use crate::farmers::validation::{
    build_comment, build_farm, build_farmer, build_membership, check_embedded_patch,
    check_farmer_patch,
};
use crate::models::farmer::{
    Comment, Embedded, Farm, Farmer, Fields, Membership, RecordId, UpdateSummary,
};
use crate::store::{Criteria, FarmerStore};

fn parse_id(raw: &str) -> Result<RecordId, AppError> {
    Ok(raw.parse::<RecordId>()?)
}

async fn load_farmer(store: &dyn FarmerStore, id: &str) -> Result<Farmer, AppError> {
    let id = parse_id(id)?;
    store
        .find_by_id(&id)
        .await?
        .ok_or_else(AppError::farmer_not_found)
}

/// A zero match count means the target does not exist. A zero modified count
/// on a match is a successful no-op.
fn require_match(summary: UpdateSummary, what: &str) -> Result<UpdateSummary, AppError> {
    if summary.matched == 0 {
        return Err(AppError::NotFound(format!("{what} Not Found")));
    }
    Ok(summary)
}

pub async fn list_farmers(
    store: &dyn FarmerStore,
    criteria: &Criteria,
) -> Result<Vec<Farmer>, AppError> {
    let farmers = store.find(criteria).await?;
    debug!("Listed {} farmers", farmers.len());
    Ok(farmers)
}

pub async fn create_farmer(
    store: &dyn FarmerStore,
    payload: Fields,
    now: DateTime<Utc>,
) -> Result<Farmer, AppError> {
    let farmer = build_farmer(payload, now)?;
    let saved = store.insert(farmer).await?;
    info!("Created farmer {}", saved.id);
    Ok(saved)
}

pub async fn get_farmer_by_id(store: &dyn FarmerStore, id: &str) -> Result<Farmer, AppError> {
    load_farmer(store, id).await
}

pub async fn update_farmer_by_id(
    store: &dyn FarmerStore,
    id: &str,
    patch: Fields,
) -> Result<UpdateSummary, AppError> {
    let id = parse_id(id)?;
    check_farmer_patch(&patch)?;
    let summary = require_match(store.update_by_id(&id, &patch).await?, "Farmer")?;
    info!("Updated farmer {id} (modified: {})", summary.modified);
    Ok(summary)
}

pub async fn list_farms_for_farmer(
    store: &dyn FarmerStore,
    id: &str,
) -> Result<Vec<Farm>, AppError> {
    Ok(load_farmer(store, id).await?.fr_farms)
}

/// Appends one embedded record; the store applies it as a single atomic push.
async fn append(store: &dyn FarmerStore, id: RecordId, item: Embedded) -> Result<Farmer, AppError> {
    let field = item.field();
    let item_id = item.id();
    let farmer = store
        .push(&id, item)
        .await?
        .ok_or_else(AppError::farmer_not_found)?;
    info!("Appended {item_id} to {field} of farmer {id}");
    Ok(farmer)
}

pub async fn create_farm(
    store: &dyn FarmerStore,
    id: &str,
    payload: Fields,
) -> Result<Farmer, AppError> {
    let id = parse_id(id)?;
    let farm = build_farm(payload)?;
    append(store, id, Embedded::Farm(farm)).await
}

pub async fn update_farm_by_id(
    store: &dyn FarmerStore,
    farm_id: &str,
    patch: Fields,
) -> Result<UpdateSummary, AppError> {
    let farm_id = parse_id(farm_id)?;
    check_embedded_patch(&patch)?;
    let summary = require_match(store.update_farm(&farm_id, &patch).await?, "Farm")?;
    info!("Updated farm {farm_id} (modified: {})", summary.modified);
    Ok(summary)
}

pub async fn list_comments_for_farmer(
    store: &dyn FarmerStore,
    id: &str,
) -> Result<Vec<Comment>, AppError> {
    Ok(load_farmer(store, id).await?.ct_comments)
}

pub async fn create_farmer_comment(
    store: &dyn FarmerStore,
    id: &str,
    payload: Fields,
) -> Result<Farmer, AppError> {
    let id = parse_id(id)?;
    let comment = build_comment(payload)?;
    append(store, id, Embedded::Comment(comment)).await
}

pub async fn create_membership(
    store: &dyn FarmerStore,
    id: &str,
    payload: Fields,
    now: DateTime<Utc>,
) -> Result<Farmer, AppError> {
    let id = parse_id(id)?;
    let membership = build_membership(payload, now)?;
    append(store, id, Embedded::Membership(membership)).await
}

/// `Ok(None)` when the Farmer exists but no membership is in force at `now`.
pub async fn get_active_membership(
    store: &dyn FarmerStore,
    id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Membership>, AppError> {
    let farmer = load_farmer(store, id).await?;
    Ok(select_active(&farmer.mi_membership, now).cloned())
}

pub async fn update_membership(
    store: &dyn FarmerStore,
    farmer_id: &str,
    membership_id: &str,
    patch: Fields,
    now: DateTime<Utc>,
) -> Result<Farmer, AppError> {
    let membership_id = parse_id(membership_id)?;
    let farmer = load_farmer(store, farmer_id).await?;

    let current = farmer
        .mi_membership
        .iter()
        .find(|m| m.id == membership_id)
        .ok_or_else(|| AppError::NotFound("Membership Not Found".to_string()))?;
    let updated = apply_patch(current, &patch, now)?;

    // The membership can vanish between the read and the write
    let saved = store
        .replace_membership(&farmer.id, updated)
        .await?
        .ok_or_else(|| AppError::NotFound("Membership Not Found".to_string()))?;
    info!("Updated membership {membership_id} of farmer {}", saved.id);
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::farmer::store_now;
    use crate::store::MemoryFarmerStore;
    use chrono::Duration;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> (MemoryFarmerStore, Farmer) {
        let store = MemoryFarmerStore::new();
        let farmer = create_farmer(
            &store,
            fields(json!({
                "fa_first_name": "Ann",
                "fa_last_name": "Brown",
                "fa_parish": "Clarendon"
            })),
            store_now(),
        )
        .await
        .unwrap();
        (store, farmer)
    }

    fn membership_payload(now: DateTime<Utc>, start: i64, end: i64) -> Fields {
        fields(json!({
            "mi_start": now + Duration::days(start),
            "mi_expiration": now + Duration::days(end),
        }))
    }

    #[tokio::test]
    async fn test_created_farmer_echoes_payload_with_id() {
        let (store, farmer) = seeded().await;
        assert_eq!(farmer.fa_first_name, "Ann");
        assert_eq!(farmer.profile.get("fa_parish"), Some(&json!("Clarendon")));

        let fetched = get_farmer_by_id(&store, &farmer.id.to_string()).await.unwrap();
        assert_eq!(fetched, farmer);
    }

    #[tokio::test]
    async fn test_get_farmer_missing_and_malformed() {
        let (store, _) = seeded().await;
        let missing = get_farmer_by_id(&store, &RecordId::generate().to_string()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let malformed = get_farmer_by_id(&store, "1234").await;
        assert!(matches!(malformed, Err(AppError::Cast(_))));
    }

    #[tokio::test]
    async fn test_list_farmers_filters_by_criteria() {
        let (store, _) = seeded().await;
        create_farmer(
            &store,
            fields(json!({
                "fa_first_name": "Bob",
                "fa_last_name": "Grant",
                "fa_parish": "St. Ann"
            })),
            store_now(),
        )
        .await
        .unwrap();

        let all = list_farmers(&store, &Criteria::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let criteria =
            Criteria::from_query([("fa_parish".to_string(), "St. Ann".to_string())].into())
                .unwrap();
        let some = list_farmers(&store, &criteria).await.unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].fa_first_name, "Bob");
    }

    #[tokio::test]
    async fn test_noop_update_is_not_a_404() {
        let (store, farmer) = seeded().await;
        let id = farmer.id.to_string();

        let same = update_farmer_by_id(&store, &id, fields(json!({"fa_parish": "Clarendon"})))
            .await
            .unwrap();
        assert_eq!(same, UpdateSummary::new(1, 0));

        let changed = update_farmer_by_id(&store, &id, fields(json!({"fa_parish": "Manchester"})))
            .await
            .unwrap();
        assert_eq!(changed.modified, 1);

        let unknown = update_farmer_by_id(
            &store,
            &RecordId::generate().to_string(),
            fields(json!({"fa_parish": "x"})),
        )
        .await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_farm_appends_at_end() {
        let (store, farmer) = seeded().await;
        let id = farmer.id.to_string();

        create_farm(&store, &id, fields(json!({"fr_name": "Hillside"})))
            .await
            .unwrap();
        let after = create_farm(&store, &id, fields(json!({"fr_name": "Lowland"})))
            .await
            .unwrap();

        assert_eq!(after.fr_farms.len(), 2);
        assert_eq!(after.fr_farms[1].fields.get("fr_name"), Some(&json!("Lowland")));

        let listed = list_farms_for_farmer(&store, &id).await.unwrap();
        assert_eq!(listed, after.fr_farms);
    }

    #[tokio::test]
    async fn test_nested_operations_on_missing_farmer_are_404() {
        let (store, _) = seeded().await;
        let ghost = RecordId::generate().to_string();

        assert!(matches!(
            create_farm(&store, &ghost, Fields::new()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            list_comments_for_farmer(&store, &ghost).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            get_active_membership(&store, &ghost, store_now()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_farm_by_its_own_id() {
        let (store, farmer) = seeded().await;
        let after = create_farm(&store, &farmer.id.to_string(), fields(json!({"fr_acres": 3})))
            .await
            .unwrap();
        let farm_id = after.fr_farms[0].id.to_string();

        let summary = update_farm_by_id(&store, &farm_id, fields(json!({"fr_acres": 5})))
            .await
            .unwrap();
        assert_eq!(summary, UpdateSummary::new(1, 1));

        let farms = list_farms_for_farmer(&store, &farmer.id.to_string()).await.unwrap();
        assert_eq!(farms[0].fields.get("fr_acres"), Some(&json!(5)));

        let unchanged = update_farm_by_id(&store, &farm_id, fields(json!({"fr_acres": 5})))
            .await
            .unwrap();
        assert_eq!(unchanged, UpdateSummary::new(1, 0));

        let missing =
            update_farm_by_id(&store, &RecordId::generate().to_string(), Fields::new()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_comment_round_trip_keeps_order() {
        let (store, farmer) = seeded().await;
        let id = farmer.id.to_string();
        for text in ["first visit", "second visit"] {
            create_farmer_comment(&store, &id, fields(json!({"ct_text": text})))
                .await
                .unwrap();
        }

        let comments = list_comments_for_farmer(&store, &id).await.unwrap();
        let texts: Vec<_> = comments.iter().map(|c| c.fields["ct_text"].clone()).collect();
        assert_eq!(texts, [json!("first visit"), json!("second visit")]);
    }

    #[tokio::test]
    async fn test_membership_lands_in_membership_collection() {
        let (store, farmer) = seeded().await;
        let now = store_now();
        let after = create_membership(
            &store,
            &farmer.id.to_string(),
            membership_payload(now, -1, 30),
            now,
        )
        .await
        .unwrap();

        assert_eq!(after.mi_membership.len(), 1);
        assert!(after.ct_comments.is_empty());
    }

    #[tokio::test]
    async fn test_active_membership_prefers_latest_update() {
        let (store, farmer) = seeded().await;
        let id = farmer.id.to_string();
        let t = store_now();

        let older = t - Duration::hours(2);
        let newer = t - Duration::hours(1);
        create_membership(&store, &id, membership_payload(t, -10, 10), older)
            .await
            .unwrap();
        let after = create_membership(&store, &id, membership_payload(t, -5, 5), newer)
            .await
            .unwrap();
        let newest = after.mi_membership[1].id;

        let active = get_active_membership(&store, &id, t).await.unwrap();
        assert_eq!(active.map(|m| m.id), Some(newest));

        let later = get_active_membership(&store, &id, t + Duration::days(60))
            .await
            .unwrap();
        assert!(later.is_none());
    }

    #[tokio::test]
    async fn test_update_membership_patches_one_record() {
        let (store, farmer) = seeded().await;
        let id = farmer.id.to_string();
        let t = store_now();
        let after = create_membership(&store, &id, membership_payload(t, -1, 1), t)
            .await
            .unwrap();
        let member_id = after.mi_membership[0].id.to_string();

        let later = t + Duration::minutes(5);
        let updated = update_membership(
            &store,
            &id,
            &member_id,
            fields(json!({"mi_type": "lifetime"})),
            later,
        )
        .await
        .unwrap();
        let m = &updated.mi_membership[0];
        assert_eq!(m.fields.get("mi_type"), Some(&json!("lifetime")));
        assert_eq!(m.mi_date_updated, later);

        let unknown = update_membership(
            &store,
            &id,
            &RecordId::generate().to_string(),
            Fields::new(),
            later,
        )
        .await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));

        let bad = update_membership(&store, &id, "nope", Fields::new(), later).await;
        assert!(matches!(bad, Err(AppError::Cast(_))));
    }
}
