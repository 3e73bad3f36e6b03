use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::models::farmer::{Embedded, Farmer, Fields, Membership, RecordId, UpdateSummary};
use crate::store::{Criteria, FarmerStore, StoreError};

/// In-process store. Every mutation runs under one write lock, so appends
/// and patches are atomic per call.
#[derive(Default)]
pub struct MemoryFarmerStore {
    farmers: RwLock<Vec<Farmer>>,
}

impl MemoryFarmerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FarmerStore for MemoryFarmerStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, criteria: &Criteria) -> Result<Vec<Farmer>, StoreError> {
        let farmers = self.farmers.read().await;
        if criteria.is_empty() {
            return Ok(farmers.clone());
        }

        let mut out = Vec::new();
        for farmer in farmers.iter() {
            if let Value::Object(map) = to_json(farmer)? {
                if criteria.matches(&map) {
                    out.push(farmer.clone());
                }
            }
        }
        Ok(out)
    }

    async fn insert(&self, farmer: Farmer) -> Result<Farmer, StoreError> {
        let mut farmers = self.farmers.write().await;
        if farmers.iter().any(|f| f.id == farmer.id) {
            return Err(StoreError::Validation(format!(
                "Duplicate key: _id {}",
                farmer.id
            )));
        }
        farmers.push(farmer.clone());
        Ok(farmer)
    }

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<Farmer>, StoreError> {
        let farmers = self.farmers.read().await;
        Ok(farmers.iter().find(|f| f.id == *id).cloned())
    }

    async fn update_by_id(
        &self,
        id: &RecordId,
        patch: &Fields,
    ) -> Result<UpdateSummary, StoreError> {
        let mut farmers = self.farmers.write().await;
        let Some(farmer) = farmers.iter_mut().find(|f| f.id == *id) else {
            return Ok(UpdateSummary::new(0, 0));
        };
        let changed = patch_record(farmer, patch)?;
        Ok(UpdateSummary::new(1, u64::from(changed)))
    }

    async fn push(&self, id: &RecordId, item: Embedded) -> Result<Option<Farmer>, StoreError> {
        let mut farmers = self.farmers.write().await;
        let Some(farmer) = farmers.iter_mut().find(|f| f.id == *id) else {
            return Ok(None);
        };
        item.append_to(farmer);
        Ok(Some(farmer.clone()))
    }

    async fn update_farm(
        &self,
        farm_id: &RecordId,
        patch: &Fields,
    ) -> Result<UpdateSummary, StoreError> {
        let mut farmers = self.farmers.write().await;
        let farm = farmers
            .iter_mut()
            .flat_map(|f| f.fr_farms.iter_mut())
            .find(|farm| farm.id == *farm_id);

        match farm {
            Some(farm) => {
                let changed = patch_record(farm, patch)?;
                Ok(UpdateSummary::new(1, u64::from(changed)))
            }
            None => Ok(UpdateSummary::new(0, 0)),
        }
    }

    async fn replace_membership(
        &self,
        farmer_id: &RecordId,
        membership: Membership,
    ) -> Result<Option<Farmer>, StoreError> {
        let mut farmers = self.farmers.write().await;
        let Some(farmer) = farmers.iter_mut().find(|f| f.id == *farmer_id) else {
            return Ok(None);
        };
        let Some(slot) = farmer
            .mi_membership
            .iter_mut()
            .find(|m| m.id == membership.id)
        else {
            return Ok(None);
        };
        *slot = membership;
        Ok(Some(farmer.clone()))
    }
}

fn to_json<T: Serialize>(record: &T) -> Result<Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Overwrites each patched field that differs. Returns whether anything changed.
/// The record is left untouched when the patched result no longer decodes.
fn patch_record<T: Serialize + DeserializeOwned>(
    record: &mut T,
    patch: &Fields,
) -> Result<bool, StoreError> {
    let Value::Object(mut map) = to_json(record)? else {
        return Err(StoreError::Corrupt("record is not an object".into()));
    };

    let mut changed = false;
    for (key, value) in patch {
        if map.get(key) != Some(value) {
            map.insert(key.clone(), value.clone());
            changed = true;
        }
    }

    if changed {
        *record = serde_json::from_value(Value::Object(map))
            .map_err(|e| StoreError::Validation(e.to_string()))?;
    }
    Ok(changed)
}
