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

//! Dynalock error types.
//!
//! [`StoreError`] is what a [`crate::store::Store`] implementation reports; [`DynaError`]
//! is what acquirers, handles, and configuration constructors report to callers.

use std::time::SystemTimeError;
use thiserror::Error;

/// Errors a [`crate::store::Store`] implementation may report.
///
/// A store only ever distinguishes between "my condition did not hold" and "something else
/// went wrong" — anything more specific (throttling, auth, network) is collapsed into
/// `Backend` with a human-readable description.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The caller-supplied condition evaluated to false against the current item.
    #[error("condition check failed")]
    ConditionFailed,
    /// Any non-conditional failure (transport, throttling, authorization, ...).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced to callers of this crate.
#[derive(Debug, Error)]
pub enum DynaError {
    /// Acquisition exhausted its configured retries without a successful conditional write.
    #[error("failed to acquire lock '{id}': retries exhausted")]
    FailedToAcquireLock {
        id: String,
        #[source]
        source: StoreError,
    },

    /// A Fail-Closed release found the record absent or owned by a different guid.
    #[error("failed to release lock '{id}': not held by this guid")]
    FailedToReleaseLock {
        id: String,
        #[source]
        source: StoreError,
    },

    /// A non-conditional failure from the store, passed through unchanged.
    #[error("backend error")]
    Backend(#[from] StoreError),

    /// Configuration failed schema-level validation at construction time.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A heartbeat tick failed; the handle has stopped heartbeating.
    #[error("heartbeat for lock '{id}' failed")]
    Heartbeat {
        id: String,
        #[source]
        source: Box<DynaError>,
    },
}

impl From<SystemTimeError> for DynaError {
    fn from(err: SystemTimeError) -> DynaError {
        error!("system clock error: {}", err);
        DynaError::Configuration(format!("system clock before UNIX_EPOCH: {}", err))
    }
}
