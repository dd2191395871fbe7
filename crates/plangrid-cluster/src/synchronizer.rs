//! Locked read-modify-write access to the shared status map.
//!
//! Every mutation takes the per-topology lock, reads or creates the record,
//! writes it back and unlocks through a drop guard. A lock that cannot be
//! taken within the configured timeout turns the mutation into a logged
//! no-op.

use std::sync::Arc;
use std::time::Duration;

use plangrid_core::ClusterStatusRecord;
use tracing::{debug, error, warn};

use crate::error::ClusterResult;
use crate::status_map::SharedStatusMap;

/// Name of the shared status map; prefixes every lock key.
pub const STATUS_MAP: &str = "plangrid.topology.status";

/// Holds the lock on one key and releases it on drop.
struct KeyLock<'a> {
    map: &'a dyn SharedStatusMap,
    key: String,
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.map.unlock(&self.key) {
            error!(key = %self.key, error = %e, "failed to release status map lock");
        }
    }
}

/// Serializes all access to the cluster-shared topology status records.
#[derive(Clone)]
pub struct StatusSynchronizer {
    map: Arc<dyn SharedStatusMap>,
    lock_timeout: Duration,
}

impl StatusSynchronizer {
    pub fn new(map: Arc<dyn SharedStatusMap>, lock_timeout: Duration) -> Self {
        Self { map, lock_timeout }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    fn lock_key(topology: &str) -> String {
        format!("{STATUS_MAP}.{topology}")
    }

    /// Run `op` while holding the lock for `topology`.
    /// `Ok(None)` means the lock was not acquired within the timeout.
    fn with_locked<T>(
        &self,
        topology: &str,
        op: impl FnOnce(&dyn SharedStatusMap) -> ClusterResult<T>,
    ) -> ClusterResult<Option<T>> {
        let key = Self::lock_key(topology);
        if !self.map.try_lock(&key, self.lock_timeout)? {
            return Ok(None);
        }
        let _guard = KeyLock {
            map: self.map.as_ref(),
            key,
        };
        op(self.map.as_ref()).map(Some)
    }

    /// Read-or-create the record for `topology`, apply `mutate`, write back.
    fn update(
        &self,
        topology: &str,
        what: &str,
        mutate: impl FnOnce(&mut ClusterStatusRecord),
    ) {
        let result = self.with_locked(topology, |map| {
            let mut record = match map.get(topology)? {
                Some(record) => record,
                None => {
                    let fresh = ClusterStatusRecord::default();
                    map.put_if_absent(topology, fresh.clone())?
                        .unwrap_or(fresh)
                }
            };
            mutate(&mut record);
            map.replace(topology, record)?;
            Ok(())
        });

        match result {
            Ok(Some(())) => debug!(%topology, what, "cluster status updated"),
            Ok(None) => error!(
                %topology,
                what,
                timeout_ms = self.lock_timeout.as_millis() as u64,
                "lock acquisition failed, cluster status not updated"
            ),
            Err(e) => error!(%topology, what, error = %e, "cluster status update failed"),
        }
    }

    /// Publish how many input dispatchers `topology` should expect.
    pub fn publish_receiver_count(&self, topology: &str, count: u32) {
        self.update(topology, "required_receiver_count", |record| {
            record.required_receiver_count = count;
        });
    }

    /// Set the operator-facing status explanation of `topology`.
    pub fn set_status(&self, topology: &str, explanation: &str) {
        self.update(topology, "status", |record| {
            record.status = explanation.to_string();
        });
    }

    /// Remove the record for `topology` if it is unchanged since read.
    /// Absent records and concurrent changes leave the map as is.
    pub fn remove(&self, topology: &str) {
        let result = self.with_locked(topology, |map| match map.get(topology)? {
            Some(current) => map.remove(topology, &current),
            None => Ok(false),
        });

        match result {
            Ok(Some(true)) => debug!(%topology, "cluster status removed"),
            Ok(Some(false)) => debug!(%topology, "no cluster status to remove"),
            Ok(None) => warn!(%topology, "lock acquisition failed, cluster status not removed"),
            Err(e) => error!(%topology, error = %e, "cluster status removal failed"),
        }
    }

    /// Current record for `topology`, read without locking.
    pub fn status(&self, topology: &str) -> ClusterResult<Option<ClusterStatusRecord>> {
        self.map.get(topology)
    }
}
