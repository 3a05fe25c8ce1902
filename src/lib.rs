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

//! Dynalock: a distributed mutual exclusion lock over a conditionally-updatable store.
//!
//! Dynalock coordinates exclusive access to a named resource across processes, using any
//! backing store that can perform a conditional write (put-if/delete-if). Two acquisition
//! protocols are provided:
//!
//!  - [`fail_closed::FailClosedLock`]: a lock with no lease. Once acquired it is held until
//!    explicitly released; a crashed holder leaves it held forever, recoverable only by an
//!    external TTL reaper acting on the record's `expiresAt` hint.
//!  - [`fail_open::FailOpenLock`]: a leased, heartbeat-extended lock. A stale lease can be
//!    stolen by a new acquirer after waiting it out, and every successful acquisition is
//!    assigned a strictly increasing fencing token so late writes from a dispossessed
//!    holder can be rejected downstream.
//!
//! Both acquirers are generic over the [`store::Store`] trait; this crate ships a
//! [`providers::mock::MockStore`] for embedding the protocol in a single process or in
//! tests, and, behind the `dynamodb` feature, a [`providers::dynamodb::DynamoDbStore`].
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use dynalock::config::{CommonConfig, FailClosedConfig};
//! use dynalock::fail_closed::FailClosedLock;
//! use dynalock::providers::mock::MockStore;
//! use dynalock::record::AttributeNames;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MockStore::new(AttributeNames::with_partition_key("lockId")));
//! let config = FailClosedConfig {
//!     common: CommonConfig {
//!         lock_table: "locks".to_string(),
//!         partition_key: "lockId".to_string(),
//!         owner: None,
//!         retry_count: 3,
//!     },
//!     acquire_period_ms: 50,
//! };
//!
//! let acquirer = FailClosedLock::new(store, config)?;
//! let handle = acquirer.acquire("shared-resource", None).await?;
//! handle.release().await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

#[macro_use]
extern crate maplit;

mod clock;
pub mod config;
pub mod error;
pub mod fail_closed;
pub mod fail_open;
mod guid;
pub mod handle;
pub mod providers;
pub mod record;
pub mod store;

pub use config::{CommonConfig, FailClosedConfig, FailOpenConfig};
pub use error::{DynaError, StoreError};
pub use fail_closed::FailClosedLock;
pub use fail_open::FailOpenLock;
pub use handle::LockHandle;
pub use record::{AttributeNames, LockRecord};
pub use store::{AttributeValue, Condition, Item, Store};

pub use providers::mock::MockStore;
#[cfg(feature = "dynamodb")]
pub use providers::dynamodb::DynamoDbStore;
