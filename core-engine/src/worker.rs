//! # Sync Worker
//!
//! Consumes sync requests from the request channel and executes them under
//! the orchestrator's retry policy. Each request runs in its own task, so
//! different tenants sync concurrently; the per-tenant lease keeps one
//! tenant's runs strictly sequential.
//!
//! Every run emits lifecycle events on the [`EventBus`] for outer surfaces
//! to observe; run failures are terminal here, never re-thrown.

use crate::error::Result;
use crate::inbound::{InboundExecutor, PullOutcome};
use crate::lease::RunLease;
use crate::outbound::{OutboundDrain, PushOutcome};
use crate::scheduler::SyncRequest;
use crate::steps::Orchestrator;
use core_runtime::{EventBus, SyncEvent};
use core_store::{StepResultRepository, SyncDirection, SyncRunId, TenantId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Executes dispatched sync requests.
pub struct SyncWorker {
    inbound: Arc<InboundExecutor>,
    outbound: Arc<OutboundDrain>,
    orchestrator: Orchestrator,
    lease: Arc<RunLease>,
    step_results: Arc<dyn StepResultRepository>,
    events: EventBus,
}

impl SyncWorker {
    pub fn new(
        inbound: Arc<InboundExecutor>,
        outbound: Arc<OutboundDrain>,
        orchestrator: Orchestrator,
        lease: Arc<RunLease>,
        step_results: Arc<dyn StepResultRepository>,
        events: EventBus,
    ) -> Self {
        Self {
            inbound,
            outbound,
            orchestrator,
            lease,
            step_results,
            events,
        }
    }

    /// Consume requests until the channel closes or cancellation fires.
    pub async fn run(
        self: Arc<Self>,
        mut requests: mpsc::Receiver<SyncRequest>,
        cancel: CancellationToken,
    ) {
        info!("Sync worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Sync worker stopping");
                    break;
                }
                request = requests.recv() => {
                    let Some(request) = request else {
                        info!("Request channel closed, sync worker stopping");
                        break;
                    };
                    let worker = self.clone();
                    tokio::spawn(async move {
                        worker.handle(request).await;
                    });
                }
            }
        }
    }

    /// Execute one request under the tenant lease.
    pub async fn handle(&self, request: SyncRequest) {
        let Some(_guard) = self.lease.acquire(request.tenant_id, request.direction) else {
            debug!(
                tenant_id = %request.tenant_id,
                direction = %request.direction,
                "Run already in flight, dropping request"
            );
            return;
        };

        let run_id = SyncRunId::new();
        match request.direction {
            SyncDirection::Pull => self.run_pull(request.tenant_id, run_id).await,
            SyncDirection::Push => self.run_push(request.tenant_id, run_id).await,
        }

        // The run is terminal either way; any later run gets a fresh run ID,
        // so its cached step outputs would never be read again
        if let Err(e) = self.step_results.clear_run(&run_id).await {
            warn!(run_id = %run_id, error = %e, "Failed to clear step outputs");
        }
    }

    async fn run_pull(&self, tenant_id: TenantId, run_id: SyncRunId) {
        self.events
            .emit(SyncEvent::PullStarted {
                tenant_id: tenant_id.as_str(),
                run_id: run_id.as_str(),
            })
            .ok();

        let result: Result<PullOutcome> = self
            .orchestrator
            .run_with_retry(&format!("pull:{}", tenant_id), || {
                self.inbound.run(&tenant_id, &run_id)
            })
            .await;

        let event = match result {
            Ok(PullOutcome::Skipped) => SyncEvent::PullSkipped {
                tenant_id: tenant_id.as_str(),
                run_id: run_id.as_str(),
            },
            Ok(PullOutcome::Completed { records_processed }) => SyncEvent::PullCompleted {
                tenant_id: tenant_id.as_str(),
                run_id: run_id.as_str(),
                records_processed,
            },
            Err(e) => {
                error!(tenant_id = %tenant_id, run_id = %run_id, error = %e, "Pull run failed");
                SyncEvent::PullFailed {
                    tenant_id: tenant_id.as_str(),
                    run_id: run_id.as_str(),
                    message: e.to_string(),
                }
            }
        };
        self.events.emit(event).ok();
    }

    async fn run_push(&self, tenant_id: TenantId, run_id: SyncRunId) {
        self.events
            .emit(SyncEvent::PushStarted {
                tenant_id: tenant_id.as_str(),
                run_id: run_id.as_str(),
            })
            .ok();

        let result: Result<PushOutcome> = self
            .orchestrator
            .run_with_retry(&format!("push:{}", tenant_id), || {
                self.outbound.run(&tenant_id, &run_id)
            })
            .await;

        let event = match result {
            Ok(PushOutcome::Skipped) => SyncEvent::PushSkipped {
                tenant_id: tenant_id.as_str(),
                run_id: run_id.as_str(),
            },
            Ok(PushOutcome::Completed { pushed, failed }) => SyncEvent::PushCompleted {
                tenant_id: tenant_id.as_str(),
                run_id: run_id.as_str(),
                pushed,
                failed,
            },
            Err(e) => {
                error!(tenant_id = %tenant_id, run_id = %run_id, error = %e, "Push run failed");
                SyncEvent::PushFailed {
                    tenant_id: tenant_id.as_str(),
                    run_id: run_id.as_str(),
                    message: e.to_string(),
                }
            }
        };
        self.events.emit(event).ok();
    }
}
