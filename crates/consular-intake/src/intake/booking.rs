use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for identifiers minted from the UUID source.
const PRIMARY_PREFIX: &str = "bk-";
/// Prefix for identifiers minted by the degraded-mode generator. Kept
/// visibly distinct so a fallback id can be spotted in the record-keeping
/// log at a glance; downstream systems treat both as opaque strings.
const FALLBACK_PREFIX: &str = "bkf-";

static FALLBACK_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Opaque booking identifier used as the idempotency key across both the
/// record-keeping call and the payment-preparation call.
///
/// One submission attempt owns exactly one identifier. Reuse across retries
/// is decided by the saga ledger, never by regenerating here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookingId(pub String);

impl BookingId {
    /// Mint a fresh identifier from the process's CSPRNG-backed UUID source.
    pub fn create() -> Self {
        Self(format!("{PRIMARY_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Degraded-mode generator for environments without the preferred
    /// random source: wall-clock millis plus a process-local counter.
    /// Collision odds are worse than [`BookingId::create`] but still
    /// negligible within one deployment.
    pub fn create_fallback(now: DateTime<Utc>) -> Self {
        let suffix = FALLBACK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "{FALLBACK_PREFIX}{}-{suffix:04}",
            now.timestamp_millis()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_fallback(&self) -> bool {
        self.0.starts_with(FALLBACK_PREFIX)
    }
}

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookingId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
