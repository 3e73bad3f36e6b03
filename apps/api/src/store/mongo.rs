use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{
    options::{IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use tracing::info;

use crate::models::farmer::{
    Embedded, Farmer, Fields, Membership, RecordId, UpdateSummary, FARMS_FIELD,
    MEMBERSHIPS_FIELD,
};
use crate::store::convert::{from_document, set_fields, to_document, Layout};
use crate::store::{Criteria, FarmerStore, StoreError};

pub const FARMER_COLLECTION: &str = "farmers";

/// Farmers live in one collection; farms, comments and memberships are
/// embedded arrays inside each Farmer document.
#[derive(Clone)]
pub struct MongoFarmerStore {
    farmers: Collection<Document>,
}

impl MongoFarmerStore {
    /// Opens the collection and makes sure the embedded-id indexes exist.
    pub async fn new(db: &Database) -> Result<Self, StoreError> {
        let store = Self {
            farmers: db.collection(FARMER_COLLECTION),
        };
        store.apply_indexes().await?;
        Ok(store)
    }

    async fn apply_indexes(&self) -> Result<(), StoreError> {
        let indexes = [FARMS_FIELD, MEMBERSHIPS_FIELD].map(|field| {
            IndexModel::builder()
                .keys(doc! { format!("{field}._id"): 1 })
                .options(Some(
                    IndexOptions::builder()
                        .name(format!("{field}_id_index"))
                        .sparse(true)
                        .build(),
                ))
                .build()
        });

        self.farmers.create_indexes(indexes).await?;
        info!("Indexes applied on '{FARMER_COLLECTION}'");
        Ok(())
    }

    async fn count(&self, filter: Document) -> Result<u64, StoreError> {
        Ok(self.farmers.count_documents(filter).await?)
    }
}

fn by_id(id: &RecordId) -> Document {
    doc! { "_id": id.object_id() }
}

#[async_trait]
impl FarmerStore for MongoFarmerStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn find(&self, criteria: &Criteria) -> Result<Vec<Farmer>, StoreError> {
        let cursor = self
            .farmers
            .find(criteria.to_filter())
            .sort(doc! { "_id": 1 })
            .await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        docs.into_iter().map(from_document).collect()
    }

    async fn insert(&self, farmer: Farmer) -> Result<Farmer, StoreError> {
        self.farmers.insert_one(to_document(&farmer, Layout::Farmer)?).await?;
        Ok(farmer)
    }

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<Farmer>, StoreError> {
        self.farmers
            .find_one(by_id(id))
            .await?
            .map(from_document)
            .transpose()
    }

    async fn update_by_id(
        &self,
        id: &RecordId,
        patch: &Fields,
    ) -> Result<UpdateSummary, StoreError> {
        // `$set` refuses an empty body.
        if patch.is_empty() {
            return Ok(UpdateSummary::new(self.count(by_id(id)).await?, 0));
        }

        let result = self
            .farmers
            .update_one(by_id(id), doc! { "$set": set_fields(patch, "") })
            .await?;
        Ok(UpdateSummary::new(result.matched_count, result.modified_count))
    }

    async fn push(&self, id: &RecordId, item: Embedded) -> Result<Option<Farmer>, StoreError> {
        let field = item.field();
        let record = match item {
            Embedded::Farm(f) => Bson::Document(to_document(&f, Layout::Plain)?),
            Embedded::Comment(c) => Bson::Document(to_document(&c, Layout::Plain)?),
            Embedded::Membership(m) => Bson::Document(to_document(&m, Layout::Membership)?),
        };

        self.farmers
            .find_one_and_update(by_id(id), doc! { "$push": { field: record } })
            .return_document(ReturnDocument::After)
            .await?
            .map(from_document)
            .transpose()
    }

    async fn update_farm(
        &self,
        farm_id: &RecordId,
        patch: &Fields,
    ) -> Result<UpdateSummary, StoreError> {
        let filter = doc! { format!("{FARMS_FIELD}._id"): farm_id.object_id() };
        if patch.is_empty() {
            return Ok(UpdateSummary::new(self.count(filter).await?.min(1), 0));
        }

        let set = set_fields(patch, &format!("{FARMS_FIELD}.$."));
        let result = self.farmers.update_one(filter, doc! { "$set": set }).await?;
        Ok(UpdateSummary::new(result.matched_count, result.modified_count))
    }

    async fn replace_membership(
        &self,
        farmer_id: &RecordId,
        membership: Membership,
    ) -> Result<Option<Farmer>, StoreError> {
        let filter = doc! {
            "_id": farmer_id.object_id(),
            format!("{MEMBERSHIPS_FIELD}._id"): membership.id.object_id(),
        };
        let record = to_document(&membership, Layout::Membership)?;

        self.farmers
            .find_one_and_update(
                filter,
                doc! { "$set": { format!("{MEMBERSHIPS_FIELD}.$"): record } },
            )
            .return_document(ReturnDocument::After)
            .await?
            .map(from_document)
            .transpose()
    }
}
