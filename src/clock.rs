//! Wall-clock helper shared by the Fail-Open acquirer and the heartbeat task.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::DynaError;

/// Milliseconds since the UNIX epoch.
pub(crate) fn now_unix_ms() -> Result<u64, DynaError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64)
}
