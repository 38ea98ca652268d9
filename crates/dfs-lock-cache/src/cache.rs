//! Per-process lock cache
//!
//! A grant obtained from the authority is kept after local use ends (`Free`)
//! and handed out again without any RPC until the authority asks for it back
//! with a revoke. Entry state transitions:
//!
//! ```text
//! None ──acquire──▶ Acquiring ──granted──▶ Locked ◀──acquire── Free
//!                       │  ▲                  │                  ▲ │
//!                denied │  │ retry/revoke     ├──release─────────┘ │
//!                       ▼  │                  │ (revoked)          │ revoke
//!                     (wait)                  ▼                    ▼
//! None ◀──────releaser loop sends Release── Releasing ◀────────────┘
//! ```
//!
//! Each entry has its own mutex, never held across an await, and a
//! `Notify` used broadcast-style to wake every local task waiting on it.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dfs_common::OwnerId;

use crate::server::LockServer;

/// Cached state of one lock name within this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No grant held
    None,
    /// Grant held and not in local use
    Free,
    /// Grant held and in local use
    Locked,
    /// Acquire RPC in flight, or denied and waiting for a callback
    Acquiring,
    /// Waiting for the releaser loop to hand the grant back
    Releasing,
}

#[derive(Debug)]
struct EntryInner {
    state: CacheState,
    revoked: bool,
    last_sequence: i64,
    /// An Acquire RPC for this entry is outstanding
    in_flight: bool,
}

struct Entry {
    inner: Mutex<EntryInner>,
    notify: Notify,
}

impl Entry {
    fn new() -> Self {
        Self {
            inner: Mutex::new(EntryInner {
                state: CacheState::None,
                revoked: false,
                last_sequence: 0,
                in_flight: false,
            }),
            notify: Notify::new(),
        }
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub acquire_rpcs: u64,
    pub denied: u64,
    pub release_rpcs: u64,
    pub rpc_failures: u64,
}

#[derive(Default)]
struct StatsCollector {
    hits: AtomicU64,
    acquire_rpcs: AtomicU64,
    denied: AtomicU64,
    release_rpcs: AtomicU64,
    rpc_failures: AtomicU64,
}

struct Shared {
    owner_id: OwnerId,
    owner_text: String,
    server: Arc<dyn LockServer>,
    entries: DashMap<String, Arc<Entry>>,
    next_sequence: AtomicI64,
    release_tx: mpsc::UnboundedSender<String>,
    stats: StatsCollector,
}

impl Shared {
    fn entry(&self, lock_id: &str) -> Arc<Entry> {
        if let Some(entry) = self.entries.get(lock_id) {
            return entry.clone();
        }
        self.entries
            .entry(lock_id.to_string())
            .or_insert_with(|| Arc::new(Entry::new()))
            .clone()
    }

    /// Hand `lock_id` to the releaser loop; the caller holds the entry lock
    /// and has already moved the entry to `Releasing`
    fn schedule_release(&self, lock_id: &str) {
        if self.release_tx.send(lock_id.to_string()).is_err() {
            warn!(lock_id = %lock_id, "Releaser loop is not running, release dropped");
        }
    }

    async fn acquire(&self, lock_id: &str) {
        let entry = self.entry(lock_id);

        loop {
            // Registered before the entry is inspected so that a wakeup sent
            // while we decide, or while the RPC below is outstanding, is kept.
            let mut notified = pin!(entry.notify.notified());
            notified.as_mut().enable();

            let sequence = {
                let mut inner = entry.inner.lock();
                match inner.state {
                    CacheState::Free => {
                        inner.state = CacheState::Locked;
                        self.stats.hits.fetch_add(1, Ordering::Relaxed);
                        counter!("lock_cache_hits_total").increment(1);
                        debug!(lock_id = %lock_id, "Cached grant reused");
                        return;
                    }
                    // Locked waits for the local holder to release. This is a
                    // stricter local exclusion than re-entering a held lock.
                    CacheState::Locked | CacheState::Releasing => None,
                    CacheState::Acquiring if inner.in_flight => None,
                    CacheState::None | CacheState::Acquiring => {
                        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
                        inner.state = CacheState::Acquiring;
                        inner.in_flight = true;
                        inner.last_sequence = sequence;
                        Some(sequence)
                    }
                }
            };

            let Some(sequence) = sequence else {
                notified.await;
                continue;
            };

            let in_flight = InFlight {
                shared: self,
                entry: entry.as_ref(),
                lock_id,
            };
            self.stats.acquire_rpcs.fetch_add(1, Ordering::Relaxed);
            counter!("lock_cache_rpc_acquire_total").increment(1);

            let granted = match self
                .server
                .acquire(lock_id, &self.owner_text, sequence)
                .await
            {
                Ok(granted) => granted,
                Err(e) => {
                    self.stats.rpc_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(lock_id = %lock_id, sequence, error = %e, "Acquire RPC failed");
                    false
                }
            };
            in_flight.complete();

            {
                let mut inner = entry.inner.lock();
                inner.in_flight = false;
                if granted {
                    inner.state = CacheState::Locked;
                    debug!(lock_id = %lock_id, sequence, "Lock granted by authority");
                    return;
                }
            }

            self.stats.denied.fetch_add(1, Ordering::Relaxed);
            debug!(lock_id = %lock_id, sequence, "Lock busy, waiting for callback");
            notified.await;
        }
    }

    fn release(&self, lock_id: &str) {
        let Some(entry) = self.entries.get(lock_id).map(|e| e.clone()) else {
            debug!(lock_id = %lock_id, "Release of unknown lock ignored");
            return;
        };

        {
            let mut inner = entry.inner.lock();
            if inner.state != CacheState::Locked {
                debug!(lock_id = %lock_id, state = ?inner.state, "Release ignored");
                return;
            }

            if inner.revoked {
                inner.state = CacheState::Releasing;
                self.schedule_release(lock_id);
                debug!(lock_id = %lock_id, "Revoked lock handed to releaser");
            } else {
                inner.state = CacheState::Free;
            }
        }

        entry.notify.notify_waiters();
    }

    fn on_revoke(&self, lock_id: &str) {
        let entry = self.entry(lock_id);

        {
            let mut inner = entry.inner.lock();
            inner.revoked = true;
            if inner.state == CacheState::Free {
                inner.state = CacheState::Releasing;
                self.schedule_release(lock_id);
            }
            debug!(lock_id = %lock_id, state = ?inner.state, "Revoke received");
        }

        entry.notify.notify_waiters();
    }

    fn on_retry(&self, lock_id: &str, sequence: i64) {
        match self.entries.get(lock_id).map(|e| e.clone()) {
            Some(entry) => {
                debug!(lock_id = %lock_id, sequence, "Retry received");
                entry.notify.notify_waiters();
            }
            None => debug!(lock_id = %lock_id, sequence, "Retry for unknown lock ignored"),
        }
    }
}

/// Clears the in-flight marker if the acquiring future is dropped mid-RPC
///
/// The authority may already have granted the lock, so the entry is handed to
/// the releaser; a Release from a non-holder is a no-op on the authority.
///
/// Known race: the abandoned Acquire can still reach the authority after the
/// Release. The authority then records this owner as holder while the entry
/// is `None`; a later Revoke only sets the revoked flag, and the lock is given
/// back on the next acquire/release cycle for this LockId.
struct InFlight<'a> {
    shared: &'a Shared,
    entry: &'a Entry,
    lock_id: &'a str,
}

impl InFlight<'_> {
    fn complete(self) {
        std::mem::forget(self);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        {
            let mut inner = self.entry.inner.lock();
            inner.in_flight = false;
            if inner.state == CacheState::Acquiring {
                inner.state = CacheState::Releasing;
                self.shared.schedule_release(self.lock_id);
            }
        }
        warn!(lock_id = %self.lock_id, "Acquire cancelled while RPC in flight");
        self.entry.notify.notify_waiters();
    }
}

async fn releaser_loop(shared: Arc<Shared>, mut queue: mpsc::UnboundedReceiver<String>) {
    while let Some(lock_id) = queue.recv().await {
        let entry = shared.entry(&lock_id);
        let sequence = entry.inner.lock().last_sequence;

        shared.stats.release_rpcs.fetch_add(1, Ordering::Relaxed);
        counter!("lock_cache_rpc_release_total").increment(1);
        match shared.server.release(&lock_id, &shared.owner_text).await {
            Ok(()) => debug!(lock_id = %lock_id, sequence, "Lock released to authority"),
            Err(e) => {
                shared.stats.rpc_failures.fetch_add(1, Ordering::Relaxed);
                warn!(lock_id = %lock_id, sequence, error = %e, "Release RPC failed");
            }
        }

        {
            let mut inner = entry.inner.lock();
            inner.revoked = false;
            inner.state = CacheState::None;
        }
        entry.notify.notify_waiters();
    }
    debug!("Releaser loop exited");
}

/// Client-side lock cache for one owner process
pub struct LockCache {
    shared: Arc<Shared>,
    releaser: JoinHandle<()>,
}

impl LockCache {
    /// Create a cache acting as `owner_id` and spawn its releaser loop on the
    /// current tokio runtime
    pub fn start(owner_id: OwnerId, server: Arc<dyn LockServer>) -> Self {
        let (release_tx, release_rx) = mpsc::unbounded_channel();
        let owner_text = owner_id.to_string();

        let shared = Arc::new(Shared {
            owner_id,
            owner_text,
            server,
            entries: DashMap::new(),
            next_sequence: AtomicI64::new(1),
            release_tx,
            stats: StatsCollector::default(),
        });

        let releaser = tokio::spawn(releaser_loop(shared.clone(), release_rx));

        info!(owner = %shared.owner_text, "LockCache initialized");

        Self { shared, releaser }
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.shared.owner_id
    }

    /// Wait until this process holds `lock_id`
    ///
    /// There is no timeout: if the holder never gives the lock back this
    /// waits forever. Authority RPC failures count as "not granted".
    pub async fn acquire(&self, lock_id: &str) {
        self.shared.acquire(lock_id).await
    }

    /// End local use of `lock_id`
    ///
    /// Never blocks and never fails. The grant stays cached unless the
    /// authority has revoked it, in which case it is returned in the
    /// background.
    pub fn release(&self, lock_id: &str) {
        self.shared.release(lock_id)
    }

    /// Acquire `lock_id` and return a guard that releases it when dropped
    pub async fn lock(&self, lock_id: &str) -> LockGuard {
        self.shared.acquire(lock_id).await;
        LockGuard {
            shared: self.shared.clone(),
            lock_id: lock_id.to_string(),
        }
    }

    pub fn on_revoke(&self, lock_id: &str) {
        self.shared.on_revoke(lock_id)
    }

    pub fn on_retry(&self, lock_id: &str, sequence: i64) {
        self.shared.on_retry(lock_id, sequence)
    }

    /// Current state of `lock_id`, or `None` if this process never touched it
    pub fn state(&self, lock_id: &str) -> Option<CacheState> {
        self.shared
            .entries
            .get(lock_id)
            .map(|entry| entry.inner.lock().state)
    }

    /// Whether a revoke for `lock_id` is pending
    pub fn is_revoked(&self, lock_id: &str) -> bool {
        self.shared
            .entries
            .get(lock_id)
            .map(|entry| entry.inner.lock().revoked)
            .unwrap_or(false)
    }

    pub fn stats(&self) -> CacheStats {
        let stats = &self.shared.stats;
        CacheStats {
            entries: self.shared.entries.len() as u64,
            hits: stats.hits.load(Ordering::Relaxed),
            acquire_rpcs: stats.acquire_rpcs.load(Ordering::Relaxed),
            denied: stats.denied.load(Ordering::Relaxed),
            release_rpcs: stats.release_rpcs.load(Ordering::Relaxed),
            rpc_failures: stats.rpc_failures.load(Ordering::Relaxed),
        }
    }

    /// Abort the releaser loop
    pub fn stop(&self) {
        self.releaser.abort();
        info!(owner = %self.shared.owner_text, "LockCache releaser loop stopped");
    }
}

impl Drop for LockCache {
    fn drop(&mut self) {
        self.releaser.abort();
    }
}

/// Holds a lock acquired through [`LockCache::lock`] until dropped
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    shared: Arc<Shared>,
    lock_id: String,
}

impl LockGuard {
    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.shared.release(&self.lock_id);
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock_id", &self.lock_id)
            .finish()
    }
}
