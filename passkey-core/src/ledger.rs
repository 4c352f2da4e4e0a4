//! Single-use, time-bounded challenge storage
//!
//! Every ceremony files its challenge under a [`CeremonyKey`]. Finish steps
//! redeem it with [`ChallengeLedger::take`], an atomic read-and-remove, so two
//! concurrent finishers can never both observe the same live challenge.
//!
//! Expiry is checked on every access. The optional background sweeper only
//! reclaims memory; correctness never depends on it.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::config::DEFAULT_CHALLENGE_TTL_MS;

/// Default lifetime of an issued challenge (5 minutes)
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_millis(DEFAULT_CHALLENGE_TTL_MS);

/// Key a challenge is filed under.
///
/// Registration and user-scoped authentication are keyed by user id.
/// Discoverable authentication is keyed by a server-generated ceremony id,
/// since no user is known when the ceremony begins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CeremonyKey(String);

impl CeremonyKey {
    pub fn registration(user_id: &str) -> Self {
        Self(format!("reg_{user_id}"))
    }

    pub fn authentication(user_id: &str) -> Self {
        Self(format!("auth_{user_id}"))
    }

    pub fn discoverable(ceremony_id: &str) -> Self {
        Self(format!("disc_{ceremony_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CeremonyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A challenge together with its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedChallenge {
    pub value: String,
    expires_at: Instant,
}

impl IssuedChallenge {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Thread-safe challenge storage, one instance per orchestrator
#[derive(Default)]
pub struct ChallengeLedger {
    entries: DashMap<String, IssuedChallenge>,
}

impl ChallengeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, invalidating whatever was there before
    pub fn issue(&self, key: &CeremonyKey, value: impl Into<String>, ttl: Duration) {
        let previous = self.entries.insert(
            key.as_str().to_string(),
            IssuedChallenge {
                value: value.into(),
                expires_at: Instant::now() + ttl,
            },
        );
        tracing::debug!(
            key = %key,
            ttl_ms = ttl.as_millis() as u64,
            replaced = previous.is_some(),
            "Challenge issued"
        );
    }

    /// Current challenge for `key`, without consuming it
    pub fn read(&self, key: &CeremonyKey) -> Option<String> {
        let now = Instant::now();
        let expired = match self.entries.get(key.as_str()) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries
                .remove_if(key.as_str(), |_, entry| entry.is_expired(now));
        }
        None
    }

    /// Remove the entry for `key`; absent keys are a no-op
    pub fn consume(&self, key: &CeremonyKey) {
        if self.entries.remove(key.as_str()).is_some() {
            tracing::debug!(key = %key, "Challenge consumed");
        }
    }

    /// Atomically remove and return the live challenge for `key`
    pub fn take(&self, key: &CeremonyKey) -> Option<IssuedChallenge> {
        let (_, entry) = self.entries.remove(key.as_str())?;
        if entry.is_expired(Instant::now()) {
            None
        } else {
            Some(entry)
        }
    }

    /// Put back a challenge previously taken, keeping its original expiry.
    ///
    /// Does nothing if the challenge has expired meanwhile or a newer
    /// challenge was issued under the same key. Returns whether it was
    /// restored.
    pub fn restore(&self, key: &CeremonyKey, challenge: IssuedChallenge) -> bool {
        if challenge.is_expired(Instant::now()) {
            return false;
        }
        match self.entries.entry(key.as_str().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(challenge);
                true
            }
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Spawn a background task purging expired entries every `interval`.
    ///
    /// The task stops when the returned handle is shut down or dropped, or
    /// when the ledger itself is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        let ledger: Weak<Self> = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = shutdown_rx.changed() => return,
                }

                let Some(ledger) = ledger.upgrade() else {
                    return;
                };
                let purged = ledger.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Expired challenges purged");
                }
            }
        });

        SweeperHandle { shutdown_tx, task }
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live/expired breakdown for monitoring
    pub fn stats(&self) -> LedgerStats {
        let now = Instant::now();
        let expired = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .count();
        LedgerStats {
            live: self.entries.len().saturating_sub(expired),
            expired,
        }
    }
}

impl fmt::Debug for ChallengeLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeLedger")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Ledger statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerStats {
    pub live: usize,
    pub expired: usize,
}

/// Controls a running sweeper task
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

impl fmt::Debug for SweeperHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweeperHandle")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn key(user: &str) -> CeremonyKey {
        CeremonyKey::registration(user)
    }

    #[test]
    fn test_key_namespaces_do_not_collide() {
        assert_ne!(CeremonyKey::registration("x"), CeremonyKey::authentication("x"));
        assert_ne!(CeremonyKey::authentication("x"), CeremonyKey::discoverable("x"));
        assert_eq!(CeremonyKey::registration("u1").as_str(), "reg_u1");
        assert_eq!(CeremonyKey::authentication("u1").as_str(), "auth_u1");
    }

    #[tokio::test]
    async fn test_issue_read_consume() {
        let ledger = ChallengeLedger::new();
        ledger.issue(&key("u1"), "abc", DEFAULT_CHALLENGE_TTL);

        assert_eq!(ledger.read(&key("u1")).as_deref(), Some("abc"));
        // Reading does not consume
        assert_eq!(ledger.read(&key("u1")).as_deref(), Some("abc"));

        ledger.consume(&key("u1"));
        assert!(ledger.read(&key("u1")).is_none());

        // Consuming an absent key is a no-op
        ledger.consume(&key("u1"));
        ledger.consume(&key("nobody"));
    }

    #[tokio::test]
    async fn test_issue_replaces_previous_challenge() {
        let ledger = ChallengeLedger::new();
        ledger.issue(&key("u1"), "first", DEFAULT_CHALLENGE_TTL);
        ledger.issue(&key("u1"), "second", DEFAULT_CHALLENGE_TTL);

        assert_eq!(ledger.read(&key("u1")).as_deref(), Some("second"));
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_after_ttl_is_absent() {
        let ledger = ChallengeLedger::new();
        ledger.issue(&key("u1"), "abc", Duration::from_millis(100));

        advance(Duration::from_millis(50)).await;
        assert!(ledger.read(&key("u1")).is_some());

        advance(Duration::from_millis(100)).await;
        assert!(ledger.read(&key("u1")).is_none());
        // The expired entry was dropped by the read itself
        assert!(ledger.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reissue_resets_expiry() {
        let ledger = ChallengeLedger::new();
        ledger.issue(&key("u1"), "old", Duration::from_millis(100));
        advance(Duration::from_millis(80)).await;
        ledger.issue(&key("u1"), "new", Duration::from_millis(100));
        advance(Duration::from_millis(80)).await;

        assert_eq!(ledger.read(&key("u1")).as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let ledger = ChallengeLedger::new();
        ledger.issue(&key("u1"), "abc", DEFAULT_CHALLENGE_TTL);

        let taken = ledger.take(&key("u1")).unwrap();
        assert_eq!(taken.value, "abc");
        assert!(ledger.take(&key("u1")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_expired_is_absent() {
        let ledger = ChallengeLedger::new();
        ledger.issue(&key("u1"), "abc", Duration::from_millis(100));
        advance(Duration::from_millis(150)).await;

        assert!(ledger.take(&key("u1")).is_none());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_restore_puts_back_taken_challenge() {
        let ledger = ChallengeLedger::new();
        ledger.issue(&key("u1"), "abc", DEFAULT_CHALLENGE_TTL);

        let taken = ledger.take(&key("u1")).unwrap();
        assert!(ledger.restore(&key("u1"), taken));
        assert_eq!(ledger.read(&key("u1")).as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_restore_never_overwrites_newer_challenge() {
        let ledger = ChallengeLedger::new();
        ledger.issue(&key("u1"), "old", DEFAULT_CHALLENGE_TTL);
        let taken = ledger.take(&key("u1")).unwrap();

        ledger.issue(&key("u1"), "new", DEFAULT_CHALLENGE_TTL);
        assert!(!ledger.restore(&key("u1"), taken));
        assert_eq!(ledger.read(&key("u1")).as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_keeps_original_expiry() {
        let ledger = ChallengeLedger::new();
        ledger.issue(&key("u1"), "abc", Duration::from_millis(100));
        let taken = ledger.take(&key("u1")).unwrap();

        advance(Duration::from_millis(60)).await;
        assert!(ledger.restore(&key("u1"), taken));
        advance(Duration::from_millis(60)).await;
        assert!(ledger.read(&key("u1")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_and_stats() {
        let ledger = ChallengeLedger::new();
        ledger.issue(&key("short"), "a", Duration::from_millis(10));
        ledger.issue(&key("long"), "b", Duration::from_secs(60));
        advance(Duration::from_millis(20)).await;

        assert_eq!(ledger.stats(), LedgerStats { live: 1, expired: 1 });
        assert_eq!(ledger.purge_expired(), 1);
        assert_eq!(ledger.stats(), LedgerStats { live: 1, expired: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_expired_entries() {
        let ledger = Arc::new(ChallengeLedger::new());
        let sweeper = ledger.spawn_sweeper(Duration::from_millis(50));
        ledger.issue(&key("u1"), "abc", Duration::from_millis(10));

        // Let the sweeper tick past the expiry
        for _ in 0..3 {
            advance(Duration::from_millis(50)).await;
            tokio::task::yield_now().await;
        }

        assert!(ledger.is_empty());
        sweeper.shutdown().await;
    }
}
