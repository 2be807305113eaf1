//! The contract every persisted record fulfils for the generic repository.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Column holding the soft-delete marker on every managed table.
pub const DELETED_AT: &str = "deleted_at";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Trait implemented by every entity a repository can manage.
///
/// The repository only needs the table, the primary key, and optionally the
/// SQL type of a column so bound values can be cast. Rows are read through
/// `row_to_json`, so the entity's serde shape must match its column names.
/// Every table carries `created_at`, `updated_at` and `deleted_at`.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    /// Name of the database table for this entity.
    const TABLE: &'static str;

    /// Name of the primary key column.
    const PRIMARY_KEY: &'static str = "id";

    /// `CREATE TABLE IF NOT EXISTS` statement run at startup.
    const CREATE_TABLE_SQL: &'static str;

    fn id(&self) -> EntityId;

    /// Postgres type of `column` (e.g. `uuid`, `timestamptz`, `int4`).
    /// Columns without an entry are bound without a cast.
    fn column_type(_column: &str) -> Option<&'static str> {
        None
    }
}

/// Primary key value. Entities use either database-generated UUIDs or serials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Text(String),
}

impl EntityId {
    pub fn to_json(&self) -> JsonValue {
        match self {
            EntityId::Int(i) => JsonValue::from(*i),
            EntityId::Text(s) => JsonValue::from(s.as_str()),
        }
    }

    /// Reads an id from a JSON value (`null` and non-scalars are rejected).
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        if let Some(s) = value.as_str() {
            return Some(EntityId::Text(s.to_string()));
        }
        value.as_i64().map(EntityId::Int)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(i) => write!(f, "{}", i),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(v: i64) -> Self {
        EntityId::Int(v)
    }
}

impl From<&str> for EntityId {
    fn from(v: &str) -> Self {
        EntityId::Text(v.to_string())
    }
}

impl From<String> for EntityId {
    fn from(v: String) -> Self {
        EntityId::Text(v)
    }
}

impl From<uuid::Uuid> for EntityId {
    fn from(v: uuid::Uuid) -> Self {
        EntityId::Text(v.to_string())
    }
}
