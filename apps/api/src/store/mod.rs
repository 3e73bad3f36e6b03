//! Document store for Farmer aggregates.
//!
//! `FarmerStore` is the seam between the record access layer and persistence.
//! `AppState` holds an `Arc<dyn FarmerStore>`, picked at startup:
//! `MongoFarmerStore` when `MONGODB_URI` is set, `MemoryFarmerStore` otherwise.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::farmer::{Embedded, Farmer, Fields, Membership, RecordId, UpdateSummary};

pub mod convert;
pub mod criteria;
pub mod memory;
pub mod mongo;

pub use criteria::Criteria;
pub use memory::MemoryFarmerStore;
pub use mongo::MongoFarmerStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Record violates its schema.
    #[error("{0}")]
    Validation(String),

    /// Identifier is not a valid ObjectId.
    #[error("{0}")]
    Cast(String),

    #[error("MongoDB error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// A stored document no longer decodes into a record.
    #[error("Malformed stored document: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait FarmerStore: Send + Sync {
    /// Short backend name, reported by the health endpoint.
    fn backend(&self) -> &'static str;

    /// All Farmers matching `criteria`, in insertion order.
    async fn find(&self, criteria: &Criteria) -> Result<Vec<Farmer>, StoreError>;

    async fn insert(&self, farmer: Farmer) -> Result<Farmer, StoreError>;

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<Farmer>, StoreError>;

    /// Overwrites top-level fields of one Farmer.
    async fn update_by_id(&self, id: &RecordId, patch: &Fields)
        -> Result<UpdateSummary, StoreError>;

    /// Atomically appends an embedded record and returns the updated Farmer,
    /// or `None` when no Farmer has `id`.
    async fn push(&self, id: &RecordId, item: Embedded) -> Result<Option<Farmer>, StoreError>;

    /// Overwrites fields of the Farm with `farm_id`, wherever it is embedded.
    async fn update_farm(
        &self,
        farm_id: &RecordId,
        patch: &Fields,
    ) -> Result<UpdateSummary, StoreError>;

    /// Replaces the embedded membership carrying `membership.id`.
    /// `None` when the Farmer, or that membership within it, does not exist.
    async fn replace_membership(
        &self,
        farmer_id: &RecordId,
        membership: Membership,
    ) -> Result<Option<Farmer>, StoreError>;
}
