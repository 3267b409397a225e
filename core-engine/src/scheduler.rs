//! # Scheduler
//!
//! Periodically scans for tenants whose sync interval has elapsed and
//! dispatches one inbound sync request per due tenant over the request
//! channel. Dispatch is fire and forget; execution, retries, and failure
//! handling belong to the worker.
//!
//! A failed scan logs a warning and skips the tick. The scan itself is a
//! pure query; tenants dispatched but still in flight are dropped by the
//! worker's per-tenant lease, not here.

use core_store::{now_timestamp, SyncDirection, TenantId, TenantRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One unit of sync work dispatched to the worker.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Tenant to sync
    pub tenant_id: TenantId,
    /// Pull or push
    pub direction: SyncDirection,
}

/// Periodic due-tenant scanner.
pub struct Scheduler {
    tenants: Arc<dyn TenantRepository>,
    requests: mpsc::Sender<SyncRequest>,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        requests: mpsc::Sender<SyncRequest>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            tenants,
            requests,
            tick_interval,
        }
    }

    /// Run the tick loop until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.tick_interval.as_secs(), "Scheduler started");
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Scan for due tenants and dispatch a pull request for each.
    ///
    /// Returns the number of requests dispatched.
    pub async fn tick(&self) -> usize {
        let due = match self.tenants.list_due(now_timestamp()).await {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "Due-tenant scan failed, skipping tick");
                return 0;
            }
        };

        let mut dispatched = 0;
        for tenant in due {
            let request = SyncRequest {
                tenant_id: tenant.id,
                direction: SyncDirection::Pull,
            };
            match self.requests.try_send(request) {
                Ok(()) => {
                    debug!(tenant_id = %tenant.id, "Dispatched pull request");
                    dispatched += 1;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(tenant_id = %tenant.id, "Request channel full, dropping dispatch");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!("Request channel closed, stopping dispatch");
                    break;
                }
            }
        }
        dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::schema::create_test_pool;
    use core_store::{SqliteTenantRepository, Tenant};

    async fn scheduler_with_tenants(
        tenants: Vec<Tenant>,
        capacity: usize,
    ) -> (Scheduler, mpsc::Receiver<SyncRequest>) {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteTenantRepository::new(pool);
        for tenant in &tenants {
            repo.insert(tenant).await.unwrap();
        }
        let (tx, rx) = mpsc::channel(capacity);
        (
            Scheduler::new(Arc::new(repo), tx, Duration::from_secs(60)),
            rx,
        )
    }

    fn tenant(name: &str) -> Tenant {
        Tenant::new(
            name.to_string(),
            "pat_x".to_string(),
            "appX".to_string(),
            "tblX".to_string(),
            15,
        )
    }

    #[tokio::test]
    async fn test_tick_dispatches_due_tenants_only() {
        let due = tenant("due");

        let mut synced_recently = tenant("recent");
        synced_recently.last_sync_at = Some(now_timestamp());

        let mut disabled = tenant("disabled");
        disabled.sync_enabled = false;

        let (scheduler, mut rx) =
            scheduler_with_tenants(vec![due.clone(), synced_recently, disabled], 8).await;

        assert_eq!(scheduler.tick().await, 1);

        let request = rx.recv().await.unwrap();
        assert_eq!(request.tenant_id, due.id);
        assert_eq!(request.direction, SyncDirection::Pull);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_tick_with_no_due_tenants() {
        let mut recent = tenant("recent");
        recent.last_sync_at = Some(now_timestamp());

        let (scheduler, mut rx) = scheduler_with_tenants(vec![recent], 8).await;
        assert_eq!(scheduler.tick().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_channel_drops_dispatch() {
        let (scheduler, mut rx) =
            scheduler_with_tenants(vec![tenant("a"), tenant("b")], 1).await;

        // One fits, one is dropped
        assert_eq!(scheduler.tick().await, 1);
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
