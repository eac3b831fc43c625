//! Concurrency-safe token store with expiry sweep.
//!
//! One explicitly constructed instance is shared (via `Arc`) between the
//! issuing session actors (writers) and the scan handlers (readers). This
//! replaces the original design's hidden process-wide cache with an
//! injectable object whose lifecycle is owned by `main`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Issuance metadata stored per token identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    /// Session the token was issued for.
    pub session_id: String,
    /// Issuance timestamp, epoch milliseconds.
    pub issued_at_ms: i64,
    /// Expiry timestamp, epoch milliseconds.
    pub expires_at_ms: i64,
}

/// Shared map from token identifier to issuance metadata.
///
/// Internally synchronized: many concurrent validators read while one
/// session actor writes. A poisoned lock is recovered rather than
/// propagated; entries are plain data and cannot be left inconsistent.
pub struct TokenStore {
    grace_ms: i64,
    entries: RwLock<HashMap<String, TokenEntry>>,
}

impl TokenStore {
    /// Create an empty store with the given grace window.
    ///
    /// The grace window only affects [`sweep`](Self::sweep): entries stay
    /// resident until `expires_at + grace` so that validation's store
    /// cross-check keeps working for late-arriving scans.
    #[must_use]
    pub fn new(grace_ms: i64) -> Self {
        Self {
            grace_ms,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a token entry.
    pub fn put(&self, token: String, entry: TokenEntry) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(token, entry);
    }

    /// Look up a token's issuance metadata.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<TokenEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(token).cloned()
    }

    /// Remove every token issued for the given session. Called on
    /// completion and cancellation; rotation deliberately does NOT purge
    /// superseded tokens (overlap windows are intentional).
    pub fn delete_all_for_session(&self, session_id: &str) -> usize {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.session_id != session_id);
        before - entries.len()
    }

    /// Remove entries past `expires_at + grace`. Entries still inside the
    /// grace window are kept. Returns the number of entries removed.
    pub fn sweep(&self, now_ms: i64) -> usize {
        let grace_ms = self.grace_ms;
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at_ms + grace_ms >= now_ms);
        before - entries.len()
    }

    /// Number of currently stored tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    /// Whether the store holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const GRACE_MS: i64 = 30_000;

    fn entry(session_id: &str, issued_at_ms: i64, expires_at_ms: i64) -> TokenEntry {
        TokenEntry {
            session_id: session_id.to_string(),
            issued_at_ms,
            expires_at_ms,
        }
    }

    #[test]
    fn test_put_and_get() {
        let store = TokenStore::new(GRACE_MS);
        store.put("tok-1".to_string(), entry("s1", 0, 90_000));

        let found = store.get("tok-1").unwrap();
        assert_eq!(found.session_id, "s1");
        assert_eq!(found.expires_at_ms, 90_000);
        assert!(store.get("tok-2").is_none());
    }

    #[test]
    fn test_sweep_keeps_entries_inside_grace_window() {
        let store = TokenStore::new(GRACE_MS);
        store.put("tok-1".to_string(), entry("s1", 0, 90_000));

        // At expiry + grace the entry is still resident.
        assert_eq!(store.sweep(120_000), 0);
        assert!(store.get("tok-1").is_some());

        // One millisecond past expiry + grace it is removed.
        assert_eq!(store.sweep(120_001), 1);
        assert!(store.get("tok-1").is_none());
    }

    #[test]
    fn test_sweep_is_selective() {
        let store = TokenStore::new(GRACE_MS);
        store.put("old".to_string(), entry("s1", 0, 90_000));
        store.put("fresh".to_string(), entry("s1", 100_000, 190_000));

        assert_eq!(store.sweep(150_000), 1);
        assert!(store.get("old").is_none());
        assert!(store.get("fresh").is_some());
    }

    #[test]
    fn test_delete_all_for_session() {
        let store = TokenStore::new(GRACE_MS);
        store.put("a".to_string(), entry("s1", 0, 90_000));
        store.put("b".to_string(), entry("s1", 30_000, 120_000));
        store.put("c".to_string(), entry("s2", 0, 90_000));

        assert_eq!(store.delete_all_for_session("s1"), 2);
        assert!(store.get("a").is_none());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_rotation_supersede_does_not_purge() {
        // Rotation only adds; both tokens coexist until swept on their own
        // expiry.
        let store = TokenStore::new(GRACE_MS);
        store.put("t1".to_string(), entry("s1", 0, 90_000));
        store.put("t2".to_string(), entry("s1", 30_000, 120_000));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(TokenStore::new(GRACE_MS));
        let writer_store = Arc::clone(&store);
        let writer = thread::spawn(move || {
            for i in 0..100 {
                writer_store.put(format!("tok-{i}"), entry("s1", 0, 90_000));
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader_store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        let _ = reader_store.get(&format!("tok-{i}"));
                    }
                })
            })
            .collect();

        writer.join().expect("writer should complete");
        for reader in readers {
            reader.join().expect("reader should complete");
        }
        assert_eq!(store.len(), 100);
    }
}
