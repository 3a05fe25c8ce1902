//! The lock handle, its heartbeat task, and release.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::clock::now_unix_ms;
use crate::error::{DynaError, StoreError};
use crate::record::{AttributeNames, LockRecord};
use crate::store::{Condition, Store};

/// A running heartbeat task and the channel its failures are reported on.
struct Heartbeat {
    task: JoinHandle<()>,
    errors: mpsc::UnboundedReceiver<DynaError>,
}

/// A held lock, returned by a successful acquisition.
///
/// In Fail-Open mode with a configured heartbeat period, the handle owns a spawned
/// `tokio` task that periodically rewrites the record with a fresh guid. In both
/// modes, [`LockHandle::release`] removes or neutralizes the record — the handle
/// carries no heartbeat in Fail-Closed mode, and that absence is exactly what `release`
/// branches on.
pub struct LockHandle<S: Store> {
    store: Arc<S>,
    id: String,
    owner: String,
    current_guid: Arc<Mutex<String>>,
    fencing_token: Option<u64>,
    lease_duration_ms: Option<u64>,
    names: AttributeNames,
    released: Arc<AtomicBool>,
    heartbeat: Option<Heartbeat>,
}

impl<S: Store + 'static> LockHandle<S> {
    /// Build a Fail-Closed handle: no fencing token, no heartbeat.
    pub(crate) fn new_fail_closed(
        store: Arc<S>,
        id: String,
        owner: String,
        guid: String,
        names: AttributeNames,
    ) -> Self {
        LockHandle {
            store,
            id,
            owner,
            current_guid: Arc::new(Mutex::new(guid)),
            fencing_token: None,
            lease_duration_ms: None,
            names,
            released: Arc::new(AtomicBool::new(false)),
            heartbeat: None,
        }
    }

    /// Build a Fail-Open handle, starting its heartbeat task when `heartbeat_period_ms`
    /// is `Some` and non-zero.
    pub(crate) fn new_fail_open(
        store: Arc<S>,
        id: String,
        owner: String,
        guid: String,
        fencing_token: u64,
        lease_duration_ms: u64,
        heartbeat_period_ms: Option<u64>,
        names: AttributeNames,
    ) -> Self {
        let current_guid = Arc::new(Mutex::new(guid));
        let released = Arc::new(AtomicBool::new(false));

        let heartbeat = match heartbeat_period_ms {
            Some(period_ms) if period_ms > 0 => Some(spawn_heartbeat(
                store.clone(),
                id.clone(),
                owner.clone(),
                fencing_token,
                lease_duration_ms,
                period_ms,
                names.clone(),
                current_guid.clone(),
                released.clone(),
            )),
            _ => None,
        };

        LockHandle {
            store,
            id,
            owner,
            current_guid,
            fencing_token: Some(fencing_token),
            lease_duration_ms: Some(lease_duration_ms),
            names,
            released,
            heartbeat,
        }
    }

    /// The lock id this handle was acquired for.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The owner string recorded at acquisition time.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The fencing token to propagate to downstream writes (`Some` only in Fail-Open mode).
    pub fn fencing_token(&self) -> Option<u64> {
        self.fencing_token
    }

    /// Whether this handle has already been released (explicitly, or implicitly by a
    /// heartbeat failure).
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// The asynchronous heartbeat error channel, or `None` when this handle has
    /// no heartbeat (Fail-Closed mode, or Fail-Open with heartbeating disabled).
    pub fn heartbeat_errors(&mut self) -> Option<&mut mpsc::UnboundedReceiver<DynaError>> {
        self.heartbeat.as_mut().map(|hb| &mut hb.errors)
    }

    /// Release this lock.
    ///
    /// Idempotent: calling this after a prior `release()`, or after the heartbeat has
    /// already failed (which marks the handle released), performs no I/O and
    /// returns `Ok(())`.
    pub async fn release(mut self) -> Result<(), DynaError> {
        if self.released.swap(true, Ordering::SeqCst) {
            if let Some(hb) = self.heartbeat.take() {
                hb.task.abort();
            }
            return Ok(());
        }

        if let Some(hb) = self.heartbeat.take() {
            hb.task.abort();
            return self.release_fail_open().await;
        }

        self.release_fail_closed().await
    }

    async fn release_fail_open(&self) -> Result<(), DynaError> {
        let guid = self.current_guid.lock().await.clone();
        let record = LockRecord {
            id: self.id.clone(),
            owner: self.owner.clone(),
            guid: guid.clone(),
            fencing_token: self.fencing_token,
            lease_duration_ms: Some(1),
            lock_acquired_time_unix_ms: Some(now_unix_ms()?),
            expires_at: None,
        };
        let item = record.to_item(&self.names);

        match self.store.put(item, Condition::GuidEquals(guid)).await {
            Ok(()) => {
                info!("lock '{}' released (lease neutralized)", self.id);
                Ok(())
            }
            Err(StoreError::ConditionFailed) => {
                // Another process already took over; our release is moot.
                info!(
                    "lock '{}' release found a new owner already in place",
                    self.id
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release_fail_closed(&self) -> Result<(), DynaError> {
        let guid = self.current_guid.lock().await.clone();
        match self
            .store
            .delete(&self.id, Condition::GuidEquals(guid))
            .await
        {
            Ok(()) => {
                info!("lock '{}' released", self.id);
                Ok(())
            }
            Err(StoreError::ConditionFailed) => {
                warn!("lock '{}' release failed: not held by this guid", self.id);
                Err(DynaError::FailedToReleaseLock {
                    id: self.id.clone(),
                    source: StoreError::ConditionFailed,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_heartbeat<S: Store + 'static>(
    store: Arc<S>,
    id: String,
    owner: String,
    fencing_token: u64,
    lease_duration_ms: u64,
    period_ms: u64,
    names: AttributeNames,
    current_guid: Arc<Mutex<String>>,
    released: Arc<AtomicBool>,
) -> Heartbeat {
    let (tx, rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(period_ms)).await;

            if released.load(Ordering::SeqCst) {
                break;
            }

            match heartbeat_tick(
                &store,
                &id,
                &owner,
                fencing_token,
                lease_duration_ms,
                &names,
                &current_guid,
            )
            .await
            {
                Ok(()) => {
                    if released.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(err) => {
                    released.store(true, Ordering::SeqCst);
                    warn!("lock '{}' heartbeat failed, handle marked released: {}", id, err);
                    let _ = tx.send(DynaError::Heartbeat {
                        id: id.clone(),
                        source: Box::new(err),
                    });
                    break;
                }
            }
        }
    });

    Heartbeat { task, errors: rx }
}

#[allow(clippy::too_many_arguments)]
async fn heartbeat_tick<S: Store>(
    store: &Arc<S>,
    id: &str,
    owner: &str,
    fencing_token: u64,
    lease_duration_ms: u64,
    names: &AttributeNames,
    current_guid: &Arc<Mutex<String>>,
) -> Result<(), DynaError> {
    let new_guid = crate::guid::generate_guid();
    let prev_guid = current_guid.lock().await.clone();

    let record = LockRecord {
        id: id.to_string(),
        owner: owner.to_string(),
        guid: new_guid.clone(),
        fencing_token: Some(fencing_token),
        lease_duration_ms: Some(lease_duration_ms),
        lock_acquired_time_unix_ms: Some(now_unix_ms()?),
        expires_at: None,
    };
    let item = record.to_item(names);

    store.put(item, Condition::GuidEquals(prev_guid)).await?;

    *current_guid.lock().await = new_guid.clone();
    info!("lock '{}' heartbeat rotated guid", id);
    Ok(())
}
