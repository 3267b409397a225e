//! # Outbound Queue Drain
//!
//! Pushes queued local edits to the remote system for one tenant. A drain
//! takes a bounded FIFO batch of pending changes and pushes each one
//! independently: a failed item is marked `failed` with its error and
//! attempt count, and the rest of the batch proceeds.
//!
//! Before fetching the batch, failed entries below the attempt cap are
//! returned to `pending` so transient push failures get re-driven; entries
//! at the cap stay terminally failed.
//!
//! Each item push is its own durable step, so a drain retried under the same
//! run ID never pushes an already-pushed item twice.

use crate::clients::RemoteClientFactory;
use crate::error::Result;
use crate::steps::StepRunner;
use core_store::{
    ChangeEntry, ChangeQueueRepository, StepResultRepository, SyncDirection, SyncLogId,
    SyncLogRepository, SyncRunId, Tenant, TenantId, TenantRepository,
};
use remote_traits::RemoteClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Result of one outbound drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Tenant missing or sync disabled; nothing was done
    Skipped,
    /// Drain finished
    Completed {
        /// Changes pushed and marked `completed`
        pushed: u64,
        /// Changes whose push attempt failed this drain
        failed: u64,
    },
}

/// Stored output of one per-item push step.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemResult {
    pushed: bool,
    error: Option<String>,
}

/// Executes outbound drains.
pub struct OutboundDrain {
    tenants: Arc<dyn TenantRepository>,
    change_queue: Arc<dyn ChangeQueueRepository>,
    sync_logs: Arc<dyn SyncLogRepository>,
    step_results: Arc<dyn StepResultRepository>,
    clients: Arc<dyn RemoteClientFactory>,
    batch_size: u32,
    max_attempts: i64,
    step_timeout: Duration,
}

impl OutboundDrain {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        change_queue: Arc<dyn ChangeQueueRepository>,
        sync_logs: Arc<dyn SyncLogRepository>,
        step_results: Arc<dyn StepResultRepository>,
        clients: Arc<dyn RemoteClientFactory>,
        batch_size: u32,
        max_attempts: i64,
        step_timeout: Duration,
    ) -> Self {
        Self {
            tenants,
            change_queue,
            sync_logs,
            step_results,
            clients,
            batch_size,
            max_attempts,
            step_timeout,
        }
    }

    /// Drain one batch of pending changes for a tenant.
    ///
    /// Re-entrant under the same `run_id`: already-pushed items replay their
    /// stored result instead of being pushed again.
    ///
    /// # Errors
    ///
    /// Returns store errors. Remote push failures are per-item outcomes,
    /// recorded on the entry, and never abort the drain.
    #[instrument(skip(self))]
    pub async fn run(&self, tenant_id: &TenantId, run_id: &SyncRunId) -> Result<PushOutcome> {
        let runner = StepRunner::new(self.step_results.clone(), *run_id, self.step_timeout);

        let tenant: Option<Tenant> = runner
            .run("load-tenant", || async {
                Ok(self.tenants.find_by_id(tenant_id).await?)
            })
            .await?;

        let Some(tenant) = tenant else {
            debug!("Tenant not found, skipping drain");
            return Ok(PushOutcome::Skipped);
        };
        if !tenant.sync_enabled {
            debug!("Sync disabled for tenant, skipping drain");
            return Ok(PushOutcome::Skipped);
        }

        let requeued: u64 = runner
            .run("requeue-retryable", || async {
                Ok(self
                    .change_queue
                    .requeue_retryable(&tenant.id, self.max_attempts)
                    .await?)
            })
            .await?;
        if requeued > 0 {
            debug!(requeued, "Returned failed changes to pending");
        }

        let batch: Vec<ChangeEntry> = runner
            .run("fetch-batch", || async {
                Ok(self
                    .change_queue
                    .fetch_pending(&tenant.id, self.batch_size)
                    .await?)
            })
            .await?;

        if batch.is_empty() {
            debug!("No pending changes, skipping drain");
            return Ok(PushOutcome::Completed {
                pushed: 0,
                failed: 0,
            });
        }

        let log_id: SyncLogId = runner
            .run("open-log", || async {
                Ok(self.sync_logs.open(&tenant.id, SyncDirection::Push).await?)
            })
            .await?;

        let client = self.clients.client_for(&tenant);

        let mut pushed = 0u64;
        let mut failed = 0u64;
        for entry in &batch {
            let step_name = format!("push-item-{}", entry.id);
            let result: ItemResult = runner
                .run(&step_name, || {
                    self.push_one(client.clone(), &tenant.table_id, entry)
                })
                .await?;

            if result.pushed {
                pushed += 1;
            } else {
                failed += 1;
            }
        }

        runner
            .run("close-log", || async {
                self.sync_logs
                    .complete(&log_id, pushed as i64, failed as i64)
                    .await?;
                Ok(())
            })
            .await?;

        info!(pushed, failed, "Drain completed");
        Ok(PushOutcome::Completed { pushed, failed })
    }

    /// Push one change and record its terminal mark.
    ///
    /// Remote failures become a failed item, not a failed drain; only store
    /// errors propagate.
    async fn push_one(
        &self,
        client: Arc<dyn RemoteClient>,
        table_id: &str,
        entry: &ChangeEntry,
    ) -> Result<ItemResult> {
        match client
            .update_fields(table_id, &entry.remote_record_id, &entry.change_data)
            .await
        {
            Ok(()) => {
                self.change_queue.mark_completed(&entry.id).await?;
                Ok(ItemResult {
                    pushed: true,
                    error: None,
                })
            }
            Err(e) => {
                warn!(
                    change_id = %entry.id,
                    remote_record_id = %entry.remote_record_id,
                    error = %e,
                    "Push failed for change"
                );
                self.change_queue.mark_failed(&entry.id, &e.to_string()).await?;
                Ok(ItemResult {
                    pushed: false,
                    error: Some(e.to_string()),
                })
            }
        }
    }
}
