//! Campaign identifier allocation and validation.
//!
//! Campaign ids are 12 hex characters, but any persistence path must also
//! accept and re-validate externally supplied ids, so the pattern check
//! (`[A-Za-z0-9_-]+`) is exposed independently of generation; this is the
//! path-traversal defense named in the external interfaces section.

use crate::error::PlannerError;
use rand::RngCore;

/// Returns `Ok(())` iff `id` is non-empty and matches `[A-Za-z0-9_-]+`.
pub fn validate(id: &str) -> Result<(), PlannerError> {
    let ok = !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(PlannerError::InvalidCampaignId(id.to_string()))
    }
}

/// Allocates a fresh 12-hex-character campaign id.
pub fn generate() -> String {
    let mut bytes = [0u8; 6];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
