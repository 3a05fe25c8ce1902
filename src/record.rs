//! The lock record data model and its codec to/from a [`Item`].

use crate::error::DynaError;
use crate::store::{AttributeValue, Item};

/// The attribute names a lock record is stored under.
///
/// Every field is independently configurable, so the partition key, token field, duration
/// field, and TTL field can each be named by the caller.
#[derive(Debug, Clone)]
pub struct AttributeNames {
    pub partition_key: String,
    pub owner: String,
    pub guid: String,
    pub fencing_token: String,
    pub lease_duration_ms: String,
    pub lock_acquired_time_unix_ms: String,
    pub expires_at: String,
}

impl AttributeNames {
    /// Build the default schema for the given partition key field name.
    pub fn with_partition_key(partition_key: impl Into<String>) -> Self {
        AttributeNames {
            partition_key: partition_key.into(),
            owner: "owner".to_string(),
            guid: "guid".to_string(),
            fencing_token: "fencingToken".to_string(),
            lease_duration_ms: "leaseDurationMs".to_string(),
            lock_acquired_time_unix_ms: "lockAcquiredTimeUnixMs".to_string(),
            expires_at: "expiresAt".to_string(),
        }
    }
}

/// A lock record: one row per lock id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub id: String,
    pub owner: String,
    pub guid: String,
    /// Present only for Fail-Open records.
    pub fencing_token: Option<u64>,
    /// Present only for Fail-Open records.
    pub lease_duration_ms: Option<u64>,
    /// Present only when the holder trusts local time.
    pub lock_acquired_time_unix_ms: Option<u64>,
    /// TTL hint for the store's background reaper; never read back by this library.
    pub expires_at: Option<u64>,
}

impl LockRecord {
    /// Encode this record as a store `Item` using `names` for attribute naming.
    pub fn to_item(&self, names: &AttributeNames) -> Item {
        let mut item = Item::new();
        item.insert(
            names.partition_key.clone(),
            AttributeValue::S(self.id.clone()),
        );
        item.insert(names.owner.clone(), AttributeValue::S(self.owner.clone()));
        item.insert(names.guid.clone(), AttributeValue::S(self.guid.clone()));
        if let Some(token) = self.fencing_token {
            item.insert(
                names.fencing_token.clone(),
                AttributeValue::N(token.to_string()),
            );
        }
        if let Some(lease) = self.lease_duration_ms {
            item.insert(
                names.lease_duration_ms.clone(),
                AttributeValue::N(lease.to_string()),
            );
        }
        if let Some(acquired) = self.lock_acquired_time_unix_ms {
            item.insert(
                names.lock_acquired_time_unix_ms.clone(),
                AttributeValue::N(acquired.to_string()),
            );
        }
        if let Some(expires) = self.expires_at {
            item.insert(
                names.expires_at.clone(),
                AttributeValue::N(expires.to_string()),
            );
        }
        item
    }

    /// Decode a record previously written under `names`.
    ///
    /// `id` is threaded through rather than read back out of the item: the partition key
    /// is the lookup key the caller already has, and a store is free to omit echoing it
    /// back on a `get`.
    pub fn from_item(item: &Item, id: &str, names: &AttributeNames) -> Result<LockRecord, DynaError> {
        let owner = item
            .get(&names.owner)
            .and_then(AttributeValue::as_s)
            .ok_or_else(|| DynaError::Configuration(format!("lock record '{id}' missing owner attribute")))?
            .to_string();
        let guid = item
            .get(&names.guid)
            .and_then(AttributeValue::as_s)
            .ok_or_else(|| DynaError::Configuration(format!("lock record '{id}' missing guid attribute")))?
            .to_string();
        let fencing_token = item.get(&names.fencing_token).and_then(AttributeValue::as_u64);
        let lease_duration_ms = item
            .get(&names.lease_duration_ms)
            .and_then(AttributeValue::as_u64);
        let lock_acquired_time_unix_ms = item
            .get(&names.lock_acquired_time_unix_ms)
            .and_then(AttributeValue::as_u64);
        let expires_at = item.get(&names.expires_at).and_then(AttributeValue::as_u64);

        Ok(LockRecord {
            id: id.to_string(),
            owner,
            guid,
            fencing_token,
            lease_duration_ms,
            lock_acquired_time_unix_ms,
            expires_at,
        })
    }
}
