use std::fmt;
use std::str::FromStr;

use bson::oid::ObjectId;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::store::StoreError;

/// Free-form record fields, kept verbatim.
pub type Fields = Map<String, Value>;

pub const FARMS_FIELD: &str = "fr_farms";
pub const COMMENTS_FIELD: &str = "ct_comments";
pub const MEMBERSHIPS_FIELD: &str = "mi_membership";

/// Store-assigned identifier. Rendered as a 24-character hex string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(ObjectId);

impl RecordId {
    pub fn generate() -> Self {
        RecordId(ObjectId::new())
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl FromStr for RecordId {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(raw)
            .map(RecordId)
            .map_err(|_| StoreError::Cast(format!("Cast to ObjectId failed for value \"{raw}\"")))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_hex())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Current time at the precision the document store keeps (milliseconds).
pub fn store_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Aggregate root. Owns its farms, comments and memberships by embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farmer {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub fa_first_name: String,
    pub fa_last_name: String,
    #[serde(default)]
    pub fr_farms: Vec<Farm>,
    #[serde(default)]
    pub ct_comments: Vec<Comment>,
    #[serde(default)]
    pub mi_membership: Vec<Membership>,
    /// Remaining contact and profile fields.
    #[serde(flatten)]
    pub profile: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub mi_start: DateTime<Utc>,
    pub mi_expiration: DateTime<Utc>,
    /// Missing on legacy records; those rank as never updated (the epoch).
    #[serde(default)]
    pub mi_date_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Membership {
    /// Whether `now` falls inside `[mi_start, mi_expiration]`, both ends inclusive.
    pub fn covers(&self, now: DateTime<Utc>) -> bool {
        self.mi_start <= now && now <= self.mi_expiration
    }
}

/// A record headed for one of a Farmer's embedded collections.
#[derive(Debug, Clone)]
pub enum Embedded {
    Farm(Farm),
    Comment(Comment),
    Membership(Membership),
}

impl Embedded {
    /// Name of the Farmer field holding this kind of record.
    pub fn field(&self) -> &'static str {
        match self {
            Embedded::Farm(_) => FARMS_FIELD,
            Embedded::Comment(_) => COMMENTS_FIELD,
            Embedded::Membership(_) => MEMBERSHIPS_FIELD,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            Embedded::Farm(f) => f.id,
            Embedded::Comment(c) => c.id,
            Embedded::Membership(m) => m.id,
        }
    }

    /// Appends the record to the matching collection of `farmer`.
    pub fn append_to(self, farmer: &mut Farmer) {
        match self {
            Embedded::Farm(f) => farmer.fr_farms.push(f),
            Embedded::Comment(c) => farmer.ct_comments.push(c),
            Embedded::Membership(m) => farmer.mi_membership.push(m),
        }
    }
}

/// Outcome of an update, in the shape the store has always reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub ok: u8,
    #[serde(rename = "n")]
    pub matched: u64,
    #[serde(rename = "nModified")]
    pub modified: u64,
}

impl UpdateSummary {
    pub fn new(matched: u64, modified: u64) -> Self {
        Self {
            ok: 1,
            matched,
            modified,
        }
    }
}
