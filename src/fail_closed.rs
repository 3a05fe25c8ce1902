//! The Fail-Closed acquirer: no lease, no heartbeat, indefinite ownership.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::now_unix_ms;
use crate::config::{FailClosedConfig, DEFAULT_EXPIRES_AT_SECS};
use crate::error::{DynaError, StoreError};
use crate::guid::{default_owner, generate_guid};
use crate::handle::LockHandle;
use crate::record::{AttributeNames, LockRecord};
use crate::store::{Condition, Store};

/// Acquires and holds Fail-Closed locks against a single table.
///
/// Once a record is written it remains in the store until explicitly released; a crashed
/// holder leaves the lock held forever, recoverable only by an external TTL reaper acting
/// on `expiresAt`. This acquirer never reads the existing record before writing — it only
/// ever attempts the conditional write and retries on contention.
pub struct FailClosedLock<S: Store> {
    store: Arc<S>,
    config: FailClosedConfig,
    names: AttributeNames,
}

impl<S: Store + 'static> FailClosedLock<S> {
    /// Construct a new acquirer, validating `config` up front.
    pub fn new(store: Arc<S>, config: FailClosedConfig) -> Result<Self, DynaError> {
        config.validate()?;
        let names = AttributeNames::with_partition_key(config.common.partition_key.clone());
        Ok(FailClosedLock {
            store,
            config,
            names,
        })
    }

    /// Attempt to acquire `id`, retrying on contention up to `retry_count` times.
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
        let expires_at = expires_at.unwrap_or((now_unix_ms()? / 1000) + DEFAULT_EXPIRES_AT_SECS);

        let mut retries_left = self.config.common.retry_count;

        loop {
            let guid = generate_guid();
            let record = LockRecord {
                id: id.to_string(),
                owner: owner.clone(),
                guid: guid.clone(),
                fencing_token: None,
                lease_duration_ms: None,
                lock_acquired_time_unix_ms: None,
                expires_at: Some(expires_at),
            };
            let item = record.to_item(&self.names);

            match self.store.put(item, Condition::NotExists).await {
                Ok(()) => {
                    info!("lock '{id}' acquired (fail-closed) by '{owner}'");
                    return Ok(LockHandle::new_fail_closed(
                        self.store.clone(),
                        id.to_string(),
                        owner,
                        guid,
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
                    tokio::time::sleep(Duration::from_millis(self.config.acquire_period_ms)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
