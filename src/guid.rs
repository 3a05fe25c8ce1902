//! Guid generation (I2: guid freshness) and owner string derivation.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;

/// Size of the per-write witness, in bytes.
const GUID_BYTES: usize = 64;

/// Generate a fresh, base64-encoded, cryptographically random guid.
///
/// Uses the OS CSPRNG via `rand`'s thread-local generator.
pub(crate) fn generate_guid() -> String {
    let mut bytes = [0u8; GUID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

/// Derive a default owner string of the form `dynalock_<user>@<host>`.
///
/// Computed fresh on every call from the environment — never cached process-wide — so a
/// caller can safely invoke this from multiple acquisitions with different effective users.
pub(crate) fn default_owner() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("dynalock_{user}@{host}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_distinct_guids() {
        let a = generate_guid();
        let b = generate_guid();
        assert_ne!(a, b);
    }

    #[test]
    fn guid_decodes_to_64_bytes() {
        let guid = generate_guid();
        let decoded = BASE64.decode(guid).unwrap();
        assert_eq!(decoded.len(), GUID_BYTES);
    }

    #[test]
    fn default_owner_has_expected_shape() {
        let owner = default_owner();
        assert!(owner.starts_with("dynalock_"));
        assert!(owner.contains('@'));
    }
}
