//! Per-tenant run lease.
//!
//! At most one run per `(tenant, direction)` may be in flight at a time.
//! The lease is an in-process set; duplicate dispatches for a tenant whose
//! run is still active are dropped by the worker. Acquisition hands back a
//! guard that releases the slot on drop, so a run that panics on its task
//! cannot strand its tenant.

use core_store::{SyncDirection, TenantId};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-process mutual exclusion for sync runs.
#[derive(Debug, Default)]
pub struct RunLease {
    active: Mutex<HashSet<(TenantId, SyncDirection)>>,
}

impl RunLease {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to acquire the lease for a tenant and direction.
    ///
    /// Returns `None` when a run for the same key is already in flight.
    /// The slot is held until the returned guard drops, including during
    /// unwinding.
    pub fn acquire(
        &self,
        tenant_id: TenantId,
        direction: SyncDirection,
    ) -> Option<LeaseGuard<'_>> {
        if self.lock().insert((tenant_id, direction)) {
            Some(LeaseGuard {
                lease: self,
                key: (tenant_id, direction),
            })
        } else {
            None
        }
    }

    /// Number of runs currently holding a lease.
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    // The lock is only held for set insert/remove; a poisoned mutex still
    // carries a consistent set, so recover it rather than propagate.
    fn lock(&self) -> MutexGuard<'_, HashSet<(TenantId, SyncDirection)>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds one `(tenant, direction)` slot until dropped.
#[derive(Debug)]
pub struct LeaseGuard<'a> {
    lease: &'a RunLease,
    key: (TenantId, SyncDirection),
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        self.lease.lock().remove(&self.key);
    }
}
