//! The Fail-Open acquirer: leased, heartbeat-extended, fenced ownership.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::now_unix_ms;
use crate::config::FailOpenConfig;
use crate::error::{DynaError, StoreError};
use crate::guid::{default_owner, generate_guid};
use crate::handle::LockHandle;
use crate::record::{AttributeNames, LockRecord};
use crate::store::{Condition, Store};

/// Acquires and holds Fail-Open locks against a single table.
///
/// Unlike [`crate::fail_closed::FailClosedLock`], this acquirer reads the existing record
/// before writing: that read lets it (a) compute the next fencing token and (b) wait out a
/// stale lease before attempting to steal it. The protocol states are `CheckExisting`,
/// `AcquireNew` (no prior record), and `AcquireExisting` (steal after `WaitLease`); they
/// are kept here as a single linear `async fn` rather than separate event handlers.
pub struct FailOpenLock<S: Store> {
    store: Arc<S>,
    config: FailOpenConfig,
    names: AttributeNames,
}

impl<S: Store + 'static> FailOpenLock<S> {
    /// Construct a new acquirer, validating `config` up front.
    pub fn new(store: Arc<S>, config: FailOpenConfig) -> Result<Self, DynaError> {
        config.validate()?;
        let names = AttributeNames::with_partition_key(config.common.partition_key.clone());
        Ok(FailOpenLock {
            store,
            config,
            names,
        })
    }

    /// Attempt to acquire `id`, waiting out and stealing a stale lease if one exists,
    /// retrying the full `CheckExisting` cycle on contention.
    pub async fn acquire(
        &self,
        id: &str,
        expires_at: Option<u64>,
    ) -> Result<LockHandle<S>, DynaError> {
        let owner = self
            .config
            .common
            .owner
            .clone()
            .unwrap_or_else(default_owner);

        let mut retries_left = self.config.common.retry_count;

        loop {
            // CheckExisting
            let existing = self.store.get(id).await?;

            let (fencing_token, steal_witness) = match &existing {
                None => (1u64, None),
                Some(item) => {
                    let lock = LockRecord::from_item(item, id, &self.names)?;
                    let wait_ms = self.wait_for_stale_lease(&lock)?;
                    if wait_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                    }
                    let token = lock.fencing_token.unwrap_or(0) + 1;
                    (token, Some((lock.guid.clone(), lock.fencing_token.unwrap_or(0))))
                }
            };

            let guid = generate_guid();
            let record = LockRecord {
                id: id.to_string(),
                owner: owner.clone(),
                guid: guid.clone(),
                fencing_token: Some(fencing_token),
                lease_duration_ms: Some(self.config.lease_duration_ms),
                lock_acquired_time_unix_ms: Some(now_unix_ms()?),
                expires_at,
            };
            let item = record.to_item(&self.names);

            let condition = match &steal_witness {
                None => Condition::NotExists,
                Some((prev_guid, prev_token)) => Condition::Or(
                    Box::new(Condition::NotExists),
                    Box::new(Condition::GuidAndTokenEquals(
                        prev_guid.clone(),
                        *prev_token,
                    )),
                ),
            };

            match self.store.put(item, condition).await {
                Ok(()) => {
                    info!(
                        "lock '{id}' acquired (fail-open) by '{owner}', token {fencing_token}"
                    );
                    return Ok(LockHandle::new_fail_open(
                        self.store.clone(),
                        id.to_string(),
                        owner,
                        guid,
                        fencing_token,
                        self.config.lease_duration_ms,
                        self.config.heartbeat_period_ms,
                        self.names.clone(),
                    ));
                }
                Err(StoreError::ConditionFailed) => {
                    if retries_left == 0 {
                        warn!("lock '{id}' acquisition exhausted retries");
                        return Err(DynaError::FailedToAcquireLock {
                            id: id.to_string(),
                            source: StoreError::ConditionFailed,
                        });
                    }
                    retries_left -= 1;
                    // The next CheckExisting re-reads the record; WaitLease supplies the
                    // only delay this mode needs.
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Compute the `WaitLease` delay for an existing record.
    fn wait_for_stale_lease(&self, lock: &LockRecord) -> Result<u64, DynaError> {
        let lease_ms = lock.lease_duration_ms.unwrap_or(0);
        if !self.config.trust_local_time {
            return Ok(lease_ms);
        }
        let now = now_unix_ms()?;
        let acquired = lock.lock_acquired_time_unix_ms.unwrap_or(now);
        let elapsed = now.saturating_sub(acquired);
        Ok(lease_ms.saturating_sub(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommonConfig;
    use crate::providers::mock::MockStore;

    fn config(lease_duration_ms: u64, trust_local_time: bool) -> FailOpenConfig {
        FailOpenConfig {
            common: CommonConfig {
                lock_table: "locks".to_string(),
                partition_key: "lockId".to_string(),
                owner: Some("test-owner".to_string()),
                retry_count: 1,
            },
            heartbeat_period_ms: None,
            lease_duration_ms,
            trust_local_time,
        }
    }

    #[tokio::test]
    async fn first_acquire_gets_token_one() {
        let store = Arc::new(MockStore::new(AttributeNames::with_partition_key("lockId")));
        let lock = FailOpenLock::new(store.clone(), config(1000, false)).unwrap();

        let handle = lock.acquire("B", None).await.unwrap();
        assert_eq!(handle.fencing_token(), Some(1));

        let item = store.get("B").await.unwrap().unwrap();
        let decoded = LockRecord::from_item(&item, "B", &AttributeNames::with_partition_key("lockId")).unwrap();
        assert_eq!(decoded.lease_duration_ms, Some(1000));
    }

    #[tokio::test]
    async fn steal_after_lease_with_trusted_clock_does_not_wait() {
        let names = AttributeNames::with_partition_key("lockId");
        let store = Arc::new(MockStore::new(names.clone()));

        let now = now_unix_ms().unwrap();
        let stale = LockRecord {
            id: "C".to_string(),
            owner: "old-owner".to_string(),
            guid: "g0".to_string(),
            fencing_token: Some(7),
            lease_duration_ms: Some(50),
            lock_acquired_time_unix_ms: Some(now.saturating_sub(100)),
            expires_at: None,
        };
        store
            .put(stale.to_item(&names), Condition::NotExists)
            .await
            .unwrap();

        let lock = FailOpenLock::new(store.clone(), config(50, true)).unwrap();

        let start = tokio::time::Instant::now();
        let handle = lock.acquire("C", None).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_millis(20));
        assert_eq!(handle.fencing_token(), Some(8));

        let item = store.get("C").await.unwrap().unwrap();
        let decoded = LockRecord::from_item(&item, "C", &names).unwrap();
        assert_ne!(decoded.guid, "g0");
    }

    #[tokio::test]
    async fn untrusted_clock_waits_full_lease() {
        let names = AttributeNames::with_partition_key("lockId");
        let store = Arc::new(MockStore::new(names.clone()));

        let now = now_unix_ms().unwrap();
        let stale = LockRecord {
            id: "D".to_string(),
            owner: "old-owner".to_string(),
            guid: "g0".to_string(),
            fencing_token: Some(1),
            lease_duration_ms: Some(50),
            lock_acquired_time_unix_ms: Some(now.saturating_sub(1000)),
            expires_at: None,
        };
        store
            .put(stale.to_item(&names), Condition::NotExists)
            .await
            .unwrap();

        let lock = FailOpenLock::new(store.clone(), config(50, false)).unwrap();

        let start = tokio::time::Instant::now();
        lock.acquire("D", None).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn monotonic_fencing_across_successive_acquisitions() {
        let names = AttributeNames::with_partition_key("lockId");
        let store = Arc::new(MockStore::new(names));
        let lock = FailOpenLock::new(store.clone(), config(10, false)).unwrap();

        let first = lock.acquire("E", None).await.unwrap();
        assert_eq!(first.fencing_token(), Some(1));
        first.release().await.unwrap();

        let second = lock.acquire("E", None).await.unwrap();
        assert_eq!(second.fencing_token(), Some(2));
    }
}
