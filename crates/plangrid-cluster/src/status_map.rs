//! Cluster-visible topology status with per-key locks.
//!
//! The contract mirrors a distributed map with pessimistic locking: a lock
//! is owned by the thread that took it, is re-entrant for that thread, and
//! `try_lock` waits at most `timeout` for another owner to let go.

use std::collections::HashMap;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use plangrid_core::ClusterStatusRecord;

use crate::error::{ClusterError, ClusterResult};

/// Cluster-shared map from topology name to status record.
pub trait SharedStatusMap: Send + Sync {
    /// Acquire the lock on `key`, waiting at most `timeout`.
    /// Returns false if the lock could not be acquired in time.
    fn try_lock(&self, key: &str, timeout: Duration) -> ClusterResult<bool>;

    fn unlock(&self, key: &str) -> ClusterResult<()>;

    fn get(&self, key: &str) -> ClusterResult<Option<ClusterStatusRecord>>;

    /// Insert unless present. Returns the existing value if there was one.
    fn put_if_absent(
        &self,
        key: &str,
        value: ClusterStatusRecord,
    ) -> ClusterResult<Option<ClusterStatusRecord>>;

    /// Replace only if present. Returns the previous value.
    fn replace(
        &self,
        key: &str,
        value: ClusterStatusRecord,
    ) -> ClusterResult<Option<ClusterStatusRecord>>;

    /// Remove only if the current value equals `expected`.
    fn remove(&self, key: &str, expected: &ClusterStatusRecord) -> ClusterResult<bool>;
}

struct LockOwner {
    thread: ThreadId,
    holds: u32,
}

/// Process-local [`SharedStatusMap`], for single-process clusters and tests.
#[derive(Default)]
pub struct InMemoryStatusMap {
    entries: Mutex<HashMap<String, ClusterStatusRecord>>,
    locks: Mutex<HashMap<String, LockOwner>>,
    released: Condvar,
}

impl InMemoryStatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any thread currently holds the lock on `key`.
    pub fn is_locked(&self, key: &str) -> bool {
        self.locks.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SharedStatusMap for InMemoryStatusMap {
    fn try_lock(&self, key: &str, timeout: Duration) -> ClusterResult<bool> {
        let me = thread::current().id();
        // `None` when the timeout reaches past what `Instant` can represent.
        let deadline = Instant::now().checked_add(timeout);
        let mut locks = self.locks.lock();
        loop {
            match locks.get(key).map(|owner| owner.thread == me) {
                None => {
                    locks.insert(key.to_string(), LockOwner { thread: me, holds: 1 });
                    return Ok(true);
                }
                Some(true) => {
                    if let Some(owner) = locks.get_mut(key) {
                        owner.holds += 1;
                    }
                    return Ok(true);
                }
                Some(false) => match deadline {
                    Some(deadline) => {
                        if Instant::now() >= deadline {
                            return Ok(false);
                        }
                        self.released.wait_until(&mut locks, deadline);
                    }
                    None => self.released.wait(&mut locks),
                },
            }
        }
    }

    fn unlock(&self, key: &str) -> ClusterResult<()> {
        let me = thread::current().id();
        let mut locks = self.locks.lock();
        let remaining = match locks.get_mut(key) {
            Some(owner) if owner.thread == me => {
                owner.holds -= 1;
                owner.holds
            }
            _ => return Err(ClusterError::NotLockOwner(key.to_string())),
        };
        if remaining == 0 {
            locks.remove(key);
            self.released.notify_all();
        }
        Ok(())
    }

    fn get(&self, key: &str) -> ClusterResult<Option<ClusterStatusRecord>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put_if_absent(
        &self,
        key: &str,
        value: ClusterStatusRecord,
    ) -> ClusterResult<Option<ClusterStatusRecord>> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key) {
            return Ok(Some(existing.clone()));
        }
        entries.insert(key.to_string(), value);
        Ok(None)
    }

    fn replace(
        &self,
        key: &str,
        value: ClusterStatusRecord,
    ) -> ClusterResult<Option<ClusterStatusRecord>> {
        let mut entries = self.entries.lock();
        Ok(entries
            .get_mut(key)
            .map(|current| std::mem::replace(current, value)))
    }

    fn remove(&self, key: &str, expected: &ClusterStatusRecord) -> ClusterResult<bool> {
        let mut entries = self.entries.lock();
        if entries.get(key) == Some(expected) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}
