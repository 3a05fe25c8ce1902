//   Copyright 2018 Chorus One, Inc.
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
//   Unless required by applicable law or agreed to in writing, software
//   distributed under the License is distributed on an "AS IS" BASIS,
//   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//   See the License for the specific language governing permissions and
//   limitations under the License.

//! An in-memory [`Store`] implementation, evaluating [`Condition`]s itself.
//!
//! Used by this crate's own test suite to exercise the protocol's invariants without a
//! real backend, and usable by downstream callers who want to embed the Dynalock protocol
//! within a single process (or in their own tests) without standing up DynamoDB.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::record::AttributeNames;
use crate::store::{AttributeValue, Condition, Item, Store};

/// An in-memory table, guarded by a single async mutex.
///
/// Real backends get atomicity per-item from the store; a single mutex around the whole
/// map is the simplest faithful stand-in for that here, since this provider only exists
/// to exercise the protocol, not to be fast.
pub struct MockStore {
    names: AttributeNames,
    items: Mutex<std::collections::HashMap<String, Item>>,
}

impl MockStore {
    /// Construct an empty store using `names` to locate the partition key and condition
    /// attributes (`guid`, `fencingToken`) within stored items.
    pub fn new(names: AttributeNames) -> Self {
        MockStore {
            names,
            items: Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn key_of(&self, item: &Item) -> Option<String> {
        item.get(&self.names.partition_key)
            .and_then(AttributeValue::as_s)
            .map(str::to_string)
    }

    fn condition_holds(&self, condition: &Condition, current: Option<&Item>) -> bool {
        match condition {
            Condition::NotExists => current.is_none(),
            Condition::GuidEquals(guid) => current
                .and_then(|item| item.get(&self.names.guid))
                .and_then(AttributeValue::as_s)
                .is_some_and(|stored| stored == guid),
            Condition::GuidAndTokenEquals(guid, token) => current.is_some_and(|item| {
                let guid_ok = item
                    .get(&self.names.guid)
                    .and_then(AttributeValue::as_s)
                    .is_some_and(|stored| stored == guid);
                let token_ok = item
                    .get(&self.names.fencing_token)
                    .and_then(AttributeValue::as_u64)
                    .is_some_and(|stored| stored == *token);
                guid_ok && token_ok
            }),
            Condition::Or(a, b) => {
                self.condition_holds(a, current) || self.condition_holds(b, current)
            }
        }
    }
}

#[async_trait]
impl Store for MockStore {
    async fn put(&self, item: Item, condition: Condition) -> Result<(), StoreError> {
        let key = self.key_of(&item).ok_or_else(|| {
            StoreError::Backend("item is missing its partition key attribute".to_string())
        })?;

        let mut items = self.items.lock().await;
        if self.condition_holds(&condition, items.get(&key)) {
            items.insert(key, item);
            Ok(())
        } else {
            Err(StoreError::ConditionFailed)
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str, condition: Condition) -> Result<(), StoreError> {
        let mut items = self.items.lock().await;
        if self.condition_holds(&condition, items.get(key)) {
            items.remove(key);
            Ok(())
        } else {
            Err(StoreError::ConditionFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> AttributeNames {
        AttributeNames::with_partition_key("lockId")
    }

    fn item(key: &str, guid: &str) -> Item {
        let mut item = Item::new();
        item.insert("lockId".to_string(), AttributeValue::S(key.to_string()));
        item.insert("guid".to_string(), AttributeValue::S(guid.to_string()));
        item
    }

    #[tokio::test]
    async fn put_succeeds_when_absent() {
        let store = MockStore::new(names());
        store
            .put(item("A", "g1"), Condition::NotExists)
            .await
            .unwrap();
        assert!(store.get("A").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn put_fails_when_already_present() {
        let store = MockStore::new(names());
        store
            .put(item("A", "g1"), Condition::NotExists)
            .await
            .unwrap();

        let err = store
            .put(item("A", "g2"), Condition::NotExists)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::ConditionFailed);
    }

    #[tokio::test]
    async fn guid_equals_condition_gates_overwrite() {
        let store = MockStore::new(names());
        store
            .put(item("A", "g1"), Condition::NotExists)
            .await
            .unwrap();

        assert_eq!(
            store
                .put(item("A", "g2"), Condition::GuidEquals("wrong".to_string()))
                .await
                .unwrap_err(),
            StoreError::ConditionFailed
        );

        store
            .put(item("A", "g2"), Condition::GuidEquals("g1".to_string()))
            .await
            .unwrap();
        let current = store.get("A").await.unwrap().unwrap();
        assert_eq!(
            current.get("guid").and_then(AttributeValue::as_s),
            Some("g2")
        );
    }

    #[tokio::test]
    async fn delete_requires_matching_guid() {
        let store = MockStore::new(names());
        store
            .put(item("A", "g1"), Condition::NotExists)
            .await
            .unwrap();

        assert_eq!(
            store
                .delete("A", Condition::GuidEquals("wrong".to_string()))
                .await
                .unwrap_err(),
            StoreError::ConditionFailed
        );

        store
            .delete("A", Condition::GuidEquals("g1".to_string()))
            .await
            .unwrap();
        assert!(store.get("A").await.unwrap().is_none());
    }
}
