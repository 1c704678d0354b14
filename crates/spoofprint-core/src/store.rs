//! Time-bounded map from a connection's remote address to its fingerprint.
//!
//! The capture path records a fingerprint during the handshake; the request
//! logging path looks it up later by the same `ip:port` key. Entries older
//! than the TTL are invisible to lookups and removed by a background sweep.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::fingerprint::Fingerprint;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Correlation key for a connection: `ip:port`, IPv6 in brackets.
pub fn remote_key(addr: &SocketAddr) -> String {
    addr.to_string()
}

struct Entry {
    fingerprint: Arc<Fingerprint>,
    captured_at: Instant,
}

struct Inner {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

/// Shared handle; clones see the same entries.
#[derive(Clone)]
pub struct FingerprintStore {
    inner: Arc<Inner>,
}

/// Snapshot for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub entries: usize,
    /// Age of the oldest entry, expired or not.
    pub oldest: Option<Duration>,
}

impl FingerprintStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                ttl,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Store `fingerprint` under `key`, replacing any earlier entry.
    pub fn record(&self, key: impl Into<String>, fingerprint: Arc<Fingerprint>) {
        let entry = Entry {
            fingerprint,
            captured_at: Instant::now(),
        };
        self.inner.entries.write().insert(key.into(), entry);
    }

    /// The fingerprint recorded for `key`, unless it is missing or older
    /// than the TTL. A miss is normal for plaintext connections.
    pub fn lookup(&self, key: &str) -> Option<Arc<Fingerprint>> {
        let entries = self.inner.entries.read();
        let entry = entries.get(key)?;
        if entry.captured_at.elapsed() > self.inner.ttl {
            return None;
        }
        Some(Arc::clone(&entry.fingerprint))
    }

    /// Drop every entry older than the TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let ttl = self.inner.ttl;
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.captured_at.elapsed() <= ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        let entries = self.inner.entries.read();
        StoreStats {
            entries: entries.len(),
            oldest: entries.values().map(|e| e.captured_at.elapsed()).max(),
        }
    }

    /// Start the periodic sweep (every TTL/2) on the current tokio runtime.
    pub fn spawn_sweeper(&self) -> Sweeper {
        let token = CancellationToken::new();
        let period = (self.inner.ttl / 2).max(MIN_SWEEP_INTERVAL);
        let store = self.clone();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = store.len(), "Swept expired fingerprints");
                        }
                    }
                }
            }
            debug!("Fingerprint sweeper stopped");
        });

        Sweeper {
            token,
            task: Some(task),
        }
    }
}

/// Handle to the background sweep. Dropping it cancels the task; `stop`
/// also waits for it to finish.
pub struct Sweeper {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Fingerprint sweeper ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
