//! Scan payload validation.
//!
//! Validation is a pure function over the payload, the store, the configured
//! limits, and a caller-supplied `now`; it performs no side effects and is
//! safe under arbitrary concurrency.
//!
//! The checks run in a fixed order:
//!
//! 1. a missing session identifier is `InvalidFormat`;
//! 2. a claimed expiry further than the grace window in the past is
//!    `Expired`;
//! 3. independently, an issuance timestamp older than expiry + grace is
//!    `Expired`, so a forged `exp` cannot extend validity past the
//!    configured maximum age;
//! 4. if the token is still stored, its recorded session must match the
//!    claimed one (`SessionMismatch`);
//! 5. a token absent from the store is still accepted when steps 2-3 passed.
//!
//! Step 5 favors availability over replay-resistance: a swept-but-unexpired
//! payload keeps working. Preserved behavior; see DESIGN.md before changing.

use super::store::TokenStore;
use crate::errors::AttendanceError;
use crate::types::ScanPayload;

/// Token validity limits in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLimits {
    /// Nominal validity window (`QR_EXPIRY_SECONDS`).
    pub expiry_ms: i64,
    /// Extra tolerance past expiry (`QR_GRACE_PERIOD_SECONDS`).
    pub grace_ms: i64,
}

impl TokenLimits {
    /// Maximum accepted age of a payload, measured from issuance.
    #[must_use]
    pub const fn max_age_ms(&self) -> i64 {
        self.expiry_ms + self.grace_ms
    }
}

/// Decide whether `payload` authorizes an attendance write at `now_ms`.
///
/// Returns the session identifier the scan should be recorded against.
pub fn validate(
    payload: &ScanPayload,
    store: &TokenStore,
    limits: TokenLimits,
    now_ms: i64,
) -> Result<String, AttendanceError> {
    if payload.sid.is_empty() {
        return Err(AttendanceError::InvalidFormat(
            "missing session identifier".to_string(),
        ));
    }

    if let Some(exp) = payload.exp {
        if now_ms > exp + limits.grace_ms {
            return Err(AttendanceError::Expired);
        }
    }

    if payload.ts > 0 && now_ms - payload.ts > limits.max_age_ms() {
        return Err(AttendanceError::Expired);
    }

    if !payload.token.is_empty() {
        if let Some(entry) = store.get(&payload.token) {
            if entry.session_id != payload.sid {
                return Err(AttendanceError::SessionMismatch);
            }
        }
        // Not found: the token may have been swept. Timestamps already
        // vouched for it above, so the scan proceeds.
    }

    Ok(payload.sid.clone())
}
