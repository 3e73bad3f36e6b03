//! Schema checks for Farmer payloads and patches.
//!
//! Identifiers are always assigned here; any `_id` a client sends on create
//! is discarded.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::farmer::{
    Comment, Farm, Farmer, Fields, Membership, RecordId, COMMENTS_FIELD, FARMS_FIELD,
    MEMBERSHIPS_FIELD,
};
use crate::store::StoreError;

const NAME_FIELDS: &[&str] = &["fa_first_name", "fa_last_name"];
const EMBEDDED_FIELDS: &[&str] = &[FARMS_FIELD, COMMENTS_FIELD, MEMBERSHIPS_FIELD];

fn invalid(msg: impl Into<String>) -> StoreError {
    StoreError::Validation(msg.into())
}

/// Field names must be plain: no operators, no dotted paths.
fn check_keys(fields: &Fields) -> Result<(), StoreError> {
    match fields
        .keys()
        .find(|k| k.is_empty() || k.starts_with('$') || k.contains('.'))
    {
        Some(bad) => Err(invalid(format!("Invalid field name \"{bad}\""))),
        None => Ok(()),
    }
}

fn check_name(fields: &Fields, key: &str, required: bool) -> Result<(), StoreError> {
    match fields.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        None if !required => Ok(()),
        _ => Err(invalid(format!("Path `{key}` is required."))),
    }
}

fn reject_id(fields: &Fields) -> Result<(), StoreError> {
    if fields.contains_key("_id") {
        return Err(invalid("Field `_id` cannot be modified"));
    }
    Ok(())
}

pub(crate) fn decode<T: DeserializeOwned>(fields: Fields) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| invalid(e.to_string()))
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub(crate) fn check_period(membership: &Membership) -> Result<(), StoreError> {
    if membership.mi_start > membership.mi_expiration {
        return Err(invalid("`mi_expiration` must not precede `mi_start`"));
    }
    Ok(())
}

/// Removes an embedded collection from a payload, as a list of objects.
fn take_items(payload: &mut Fields, field: &str) -> Result<Vec<Fields>, StoreError> {
    match payload.remove(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                _ => Err(invalid(format!("`{field}` must contain only objects"))),
            })
            .collect(),
        Some(_) => Err(invalid(format!("`{field}` must be an array"))),
    }
}

pub fn build_farmer(mut payload: Fields, now: DateTime<Utc>) -> Result<Farmer, StoreError> {
    check_keys(&payload)?;
    payload.remove("_id");
    for key in NAME_FIELDS {
        check_name(&payload, key, true)?;
    }

    let farms = take_items(&mut payload, FARMS_FIELD)?
        .into_iter()
        .map(build_farm)
        .collect::<Result<Vec<_>, _>>()?;
    let comments = take_items(&mut payload, COMMENTS_FIELD)?
        .into_iter()
        .map(build_comment)
        .collect::<Result<Vec<_>, _>>()?;
    let memberships = take_items(&mut payload, MEMBERSHIPS_FIELD)?
        .into_iter()
        .map(|m| build_membership(m, now))
        .collect::<Result<Vec<_>, _>>()?;

    payload.insert("_id".into(), Value::String(RecordId::generate().to_string()));
    let mut farmer: Farmer = decode(payload)?;
    farmer.fr_farms = farms;
    farmer.ct_comments = comments;
    farmer.mi_membership = memberships;
    Ok(farmer)
}

pub fn build_farm(mut payload: Fields) -> Result<Farm, StoreError> {
    check_keys(&payload)?;
    payload.remove("_id");
    Ok(Farm {
        id: RecordId::generate(),
        fields: payload,
    })
}

pub fn build_comment(mut payload: Fields) -> Result<Comment, StoreError> {
    check_keys(&payload)?;
    payload.remove("_id");
    Ok(Comment {
        id: RecordId::generate(),
        fields: payload,
    })
}

pub fn build_membership(mut payload: Fields, now: DateTime<Utc>) -> Result<Membership, StoreError> {
    check_keys(&payload)?;
    for key in ["mi_start", "mi_expiration"] {
        if payload.get(key).map_or(true, Value::is_null) {
            return Err(invalid(format!("Path `{key}` is required.")));
        }
    }

    payload.insert("_id".into(), Value::String(RecordId::generate().to_string()));
    payload.insert("mi_date_updated".into(), timestamp(now));
    let membership: Membership = decode(payload)?;
    check_period(&membership)?;
    Ok(membership)
}

pub fn check_farmer_patch(patch: &Fields) -> Result<(), StoreError> {
    check_keys(patch)?;
    reject_id(patch)?;
    if let Some(field) = EMBEDDED_FIELDS.iter().find(|f| patch.contains_key(**f)) {
        return Err(invalid(format!(
            "`{field}` cannot be replaced wholesale; use its nested endpoint"
        )));
    }
    for key in NAME_FIELDS {
        check_name(patch, key, false)?;
    }
    Ok(())
}

pub fn check_embedded_patch(patch: &Fields) -> Result<(), StoreError> {
    check_keys(patch)?;
    reject_id(patch)
}
