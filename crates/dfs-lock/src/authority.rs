//! Lock authority state and notifier loops
//!
//! Each lock name maps to a `Row` guarded by its own mutex, so unrelated names
//! never contend. Rows are created on first reference and live as long as the
//! authority. The mutex is only held for in-memory bookkeeping, never across
//! an await; callbacks are delivered by two background loops fed through
//! unbounded channels, so Acquire/Release handlers never block on the network.
//!
//! The retry loop wakes *every* queued waiter of a row at once. All of them
//! race to re-acquire, exactly one wins, and the losers queue up again and
//! trigger a fresh revoke cycle. This costs a burst of retries under
//! contention but a waiter whose callback endpoint is unreachable can never
//! hold up the waiters queued behind it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dfs_common::OwnerId;

use crate::error::CallbackError;
use crate::notifier::CallbackNotifier;

/// Server-side record of one lock name
#[derive(Debug)]
struct Row {
    holder: Option<String>,
    holder_sequence: i64,
    waiters: VecDeque<String>,
    /// Debounces revoke scheduling; cleared by a grant or a retry round
    revoke_in_flight: bool,
    last_sequence: HashMap<String, i64>,
}

impl Default for Row {
    fn default() -> Self {
        Self {
            holder: None,
            holder_sequence: -1,
            waiters: VecDeque::new(),
            revoke_in_flight: false,
            last_sequence: HashMap::new(),
        }
    }
}

/// Snapshot of authority counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityStats {
    pub rows: u64,
    pub grants: u64,
    pub denials: u64,
    pub releases: u64,
    pub ignored_releases: u64,
    pub revokes_sent: u64,
    pub retries_sent: u64,
    pub callback_failures: u64,
}

#[derive(Default)]
struct StatsCollector {
    grants: AtomicU64,
    denials: AtomicU64,
    releases: AtomicU64,
    ignored_releases: AtomicU64,
    revokes_sent: AtomicU64,
    retries_sent: AtomicU64,
    callback_failures: AtomicU64,
}

struct Shared {
    rows: DashMap<String, Arc<Mutex<Row>>>,
    revoke_tx: mpsc::UnboundedSender<String>,
    retry_tx: mpsc::UnboundedSender<String>,
    stats: StatsCollector,
}

impl Shared {
    fn row(&self, lock_id: &str) -> Arc<Mutex<Row>> {
        if let Some(row) = self.rows.get(lock_id) {
            return row.clone();
        }
        self.rows.entry(lock_id.to_string()).or_default().clone()
    }

    fn schedule_revoke(&self, lock_id: &str) {
        if self.revoke_tx.send(lock_id.to_string()).is_err() {
            warn!(lock_id = %lock_id, "Revoke loop is not running, revoke dropped");
        }
    }

    fn schedule_retry(&self, lock_id: &str) {
        if self.retry_tx.send(lock_id.to_string()).is_err() {
            warn!(lock_id = %lock_id, "Retry loop is not running, retry round dropped");
        }
    }

    fn record_callback_failure(&self, kind: &str, lock_id: &str, owner: &str, err: &CallbackError) {
        self.stats.callback_failures.fetch_add(1, Ordering::Relaxed);
        counter!("lock_callback_failures_total").increment(1);
        warn!(
            lock_id = %lock_id,
            owner = %owner,
            error = %err,
            "Failed to deliver {} callback",
            kind
        );
    }
}

/// The lock-granting authority
///
/// Dropping the authority (or calling [`LockAuthority::stop`]) aborts its
/// notifier loops. All state is in memory and lost with the process.
pub struct LockAuthority {
    shared: Arc<Shared>,
    revoker: JoinHandle<()>,
    retrier: JoinHandle<()>,
}

impl LockAuthority {
    /// Create an authority and spawn its revoke and retry loops on the
    /// current tokio runtime
    pub fn start(notifier: Arc<dyn CallbackNotifier>) -> Self {
        let (revoke_tx, revoke_rx) = mpsc::unbounded_channel();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            rows: DashMap::new(),
            revoke_tx,
            retry_tx,
            stats: StatsCollector::default(),
        });

        let revoker = tokio::spawn(revoke_loop(shared.clone(), notifier.clone(), revoke_rx));
        let retrier = tokio::spawn(retry_loop(shared.clone(), notifier, retry_rx));

        info!("LockAuthority initialized with revoke and retry loops");

        Self {
            shared,
            revoker,
            retrier,
        }
    }

    /// Try to grant `lock_id` to `owner_id`
    ///
    /// Returns `true` when the owner now holds the lock (including when it
    /// already did). Otherwise the owner is queued, a revoke is scheduled for
    /// the current holder unless one is already pending, and `false` is
    /// returned; the caller should wait for a retry callback.
    pub fn acquire(&self, lock_id: &str, owner_id: &str, sequence: i64) -> bool {
        let cell = self.shared.row(lock_id);
        let mut row = cell.lock();

        let seen = row
            .last_sequence
            .entry(owner_id.to_string())
            .or_insert(sequence);
        *seen = (*seen).max(sequence);

        if row.holder.is_none() {
            row.holder = Some(owner_id.to_string());
            row.holder_sequence = sequence;
            row.revoke_in_flight = false;
            self.shared.stats.grants.fetch_add(1, Ordering::Relaxed);
            counter!("lock_acquire_granted_total").increment(1);
            debug!(lock_id = %lock_id, owner = %owner_id, sequence, "Lock granted");
            return true;
        }

        if row.holder.as_deref() == Some(owner_id) {
            debug!(lock_id = %lock_id, owner = %owner_id, sequence, "Lock re-acquired by holder");
            return true;
        }

        row.waiters.push_back(owner_id.to_string());
        if !row.revoke_in_flight {
            row.revoke_in_flight = true;
            self.shared.schedule_revoke(lock_id);
        }
        self.shared.stats.denials.fetch_add(1, Ordering::Relaxed);
        counter!("lock_acquire_denied_total").increment(1);
        debug!(
            lock_id = %lock_id,
            owner = %owner_id,
            sequence,
            waiters = row.waiters.len(),
            "Lock busy, owner queued"
        );
        false
    }

    /// Release `lock_id` on behalf of `owner_id`
    ///
    /// Releases from an owner that is not the holder are accepted and change
    /// nothing.
    pub fn release(&self, lock_id: &str, owner_id: &str) {
        let cell = self.shared.row(lock_id);
        let mut row = cell.lock();

        if row.holder.as_deref() != Some(owner_id) {
            self.shared
                .stats
                .ignored_releases
                .fetch_add(1, Ordering::Relaxed);
            debug!(lock_id = %lock_id, owner = %owner_id, "Release from non-holder ignored");
            return;
        }

        row.holder = None;
        row.holder_sequence = -1;
        self.shared.stats.releases.fetch_add(1, Ordering::Relaxed);
        counter!("lock_release_total").increment(1);

        if !row.waiters.is_empty() {
            self.shared.schedule_retry(lock_id);
        }
        debug!(
            lock_id = %lock_id,
            owner = %owner_id,
            waiters = row.waiters.len(),
            "Lock released"
        );
    }

    /// Current holder of `lock_id`, if any
    pub fn holder(&self, lock_id: &str) -> Option<String> {
        self.shared
            .rows
            .get(lock_id)
            .and_then(|row| row.lock().holder.clone())
    }

    /// Sequence number the current holder was granted with, or -1
    pub fn holder_sequence(&self, lock_id: &str) -> i64 {
        self.shared
            .rows
            .get(lock_id)
            .map(|row| row.lock().holder_sequence)
            .unwrap_or(-1)
    }

    /// Queued waiters of `lock_id` in FIFO order
    pub fn waiters(&self, lock_id: &str) -> Vec<String> {
        self.shared
            .rows
            .get(lock_id)
            .map(|row| row.lock().waiters.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a revoke has been scheduled and not yet followed by a retry round
    pub fn revoke_in_flight(&self, lock_id: &str) -> bool {
        self.shared
            .rows
            .get(lock_id)
            .map(|row| row.lock().revoke_in_flight)
            .unwrap_or(false)
    }

    pub fn stats(&self) -> AuthorityStats {
        let stats = &self.shared.stats;
        AuthorityStats {
            rows: self.shared.rows.len() as u64,
            grants: stats.grants.load(Ordering::Relaxed),
            denials: stats.denials.load(Ordering::Relaxed),
            releases: stats.releases.load(Ordering::Relaxed),
            ignored_releases: stats.ignored_releases.load(Ordering::Relaxed),
            revokes_sent: stats.revokes_sent.load(Ordering::Relaxed),
            retries_sent: stats.retries_sent.load(Ordering::Relaxed),
            callback_failures: stats.callback_failures.load(Ordering::Relaxed),
        }
    }

    /// Abort the notifier loops
    pub fn stop(&self) {
        self.revoker.abort();
        self.retrier.abort();
        info!("LockAuthority notifier loops stopped");
    }
}

impl Drop for LockAuthority {
    fn drop(&mut self) {
        self.revoker.abort();
        self.retrier.abort();
    }
}

async fn revoke_loop(
    shared: Arc<Shared>,
    notifier: Arc<dyn CallbackNotifier>,
    mut queue: mpsc::UnboundedReceiver<String>,
) {
    while let Some(lock_id) = queue.recv().await {
        let holder = shared.row(&lock_id).lock().holder.clone();
        let Some(holder) = holder else {
            debug!(lock_id = %lock_id, "Lock already free, revoke skipped");
            continue;
        };

        let result = match holder.parse::<OwnerId>() {
            Ok(owner) => notifier.revoke(&owner, &lock_id).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                shared.stats.revokes_sent.fetch_add(1, Ordering::Relaxed);
                counter!("lock_revoke_sent_total").increment(1);
                debug!(lock_id = %lock_id, owner = %holder, "Revoke delivered");
            }
            Err(e) => shared.record_callback_failure("revoke", &lock_id, &holder, &e),
        }
    }
    debug!("Revoke loop exited");
}

async fn retry_loop(
    shared: Arc<Shared>,
    notifier: Arc<dyn CallbackNotifier>,
    mut queue: mpsc::UnboundedReceiver<String>,
) {
    while let Some(lock_id) = queue.recv().await {
        let batch = pop_waiters(&shared, &lock_id);
        debug!(lock_id = %lock_id, waiters = batch.len(), "Retry round");

        for (owner_text, sequence) in batch {
            let result = match owner_text.parse::<OwnerId>() {
                Ok(owner) => notifier.retry(&owner, &lock_id, sequence).await,
                Err(e) => Err(e.into()),
            };

            match result {
                Ok(()) => {
                    shared.stats.retries_sent.fetch_add(1, Ordering::Relaxed);
                    counter!("lock_retry_sent_total").increment(1);
                    debug!(lock_id = %lock_id, owner = %owner_text, sequence, "Retry delivered");
                }
                Err(e) => shared.record_callback_failure("retry", &lock_id, &owner_text, &e),
            }
        }
    }
    debug!("Retry loop exited");
}

/// Drain every queued waiter of a row, once per owner in first-queued order,
/// paired with the newest sequence seen from that owner
fn pop_waiters(shared: &Shared, lock_id: &str) -> Vec<(String, i64)> {
    let cell = shared.row(lock_id);
    let mut row = cell.lock();
    row.revoke_in_flight = false;

    let mut seen = HashSet::new();
    let owners: Vec<String> = row
        .waiters
        .drain(..)
        .filter(|owner| seen.insert(owner.clone()))
        .collect();

    owners
        .into_iter()
        .map(|owner| {
            let sequence = row.last_sequence.get(&owner).copied().unwrap_or(0);
            (owner, sequence)
        })
        .collect()
}
