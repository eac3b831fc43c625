//! Token issuance.
//!
//! Issues an opaque 256-bit identifier from the OS CSPRNG, records it in the
//! [`TokenStore`], and builds the scan payload plus the deep link a display
//! renders as a scannable code. Issuance sweeps the store opportunistically,
//! bounding resident tokens without a dedicated timer.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use super::store::{TokenEntry, TokenStore};
use crate::errors::AttendanceError;
use crate::types::ScanPayload;

/// Raw token identifier length in bytes (256 bits of entropy).
const TOKEN_BYTES: usize = 32;

/// A freshly issued token with its presentation artifacts.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Opaque token identifier (base64 url-safe, unpadded).
    pub token: String,
    /// The wire payload embedded in the scannable code.
    pub payload: ScanPayload,
    /// Deep link carrying the payload; what the client actually encodes
    /// into the displayed image.
    pub deep_link: String,
    /// Expiry timestamp, epoch milliseconds.
    pub expires_at_ms: i64,
}

/// Creates rotating tokens for active sessions.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    base_url: String,
    expiry_ms: i64,
}

impl TokenIssuer {
    /// Create an issuer producing tokens valid for `expiry_seconds` and deep
    /// links rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, expiry_seconds: u64) -> Self {
        Self {
            base_url: base_url.into(),
            expiry_ms: (expiry_seconds * 1000) as i64,
        }
    }

    /// Issue a new token for `session_id` at `now_ms`.
    ///
    /// The entry is written to `store` before the payload is returned, so a
    /// scan arriving immediately after display always finds it. The
    /// superseded token (if any) is left untouched; overlapping validity is
    /// intentional.
    pub fn issue(
        &self,
        store: &TokenStore,
        session_id: &str,
        now_ms: i64,
    ) -> Result<IssuedToken, AttendanceError> {
        let mut raw = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);

        let expires_at_ms = now_ms + self.expiry_ms;
        store.put(
            token.clone(),
            TokenEntry {
                session_id: session_id.to_string(),
                issued_at_ms: now_ms,
                expires_at_ms,
            },
        );
        let swept = store.sweep(now_ms);
        if swept > 0 {
            tracing::debug!(
                target: "attendance.tokens",
                swept,
                "removed expired tokens during issuance"
            );
        }

        let payload = ScanPayload {
            token: token.clone(),
            sid: session_id.to_string(),
            ts: now_ms,
            exp: Some(expires_at_ms),
        };
        let deep_link = self.deep_link(&payload)?;

        tracing::debug!(
            target: "attendance.tokens",
            session_id,
            expires_at_ms,
            "issued token"
        );

        Ok(IssuedToken {
            token,
            payload,
            deep_link,
            expires_at_ms,
        })
    }

    /// Build the scan deep link: `{base_url}/scan?data=<base64url(json)>`.
    ///
    /// The payload JSON is base64url-encoded so the link stays a valid URL;
    /// the decoded bytes are exactly the scan payload the server accepts.
    fn deep_link(&self, payload: &ScanPayload) -> Result<String, AttendanceError> {
        let json = serde_json::to_string(payload)
            .map_err(|e| AttendanceError::Internal(format!("payload encode failed: {e}")))?;
        Ok(format!(
            "{}/scan?data={}",
            self.base_url,
            URL_SAFE_NO_PAD.encode(json)
        ))
    }
}
