//! # Engine Facade
//!
//! Wires the store, scheduler, and worker together over one SQLite pool and
//! runs them as background tasks until shut down.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_engine::{AirtableClientFactory, EngineConfig, SyncEngine, WeightScorer};
//! use core_store::schema::{create_pool, initialize, DatabaseConfig};
//! use std::sync::Arc;
//!
//! let pool = create_pool(DatabaseConfig::new("mirror.db")).await?;
//! initialize(&pool).await?;
//!
//! let engine = SyncEngine::start(
//!     pool,
//!     Arc::new(AirtableClientFactory::new()),
//!     Arc::new(WeightScorer),
//!     EngineConfig::default(),
//! );
//!
//! // ... later
//! engine.shutdown().await;
//! ```

use crate::clients::RemoteClientFactory;
use crate::config::EngineConfig;
use crate::inbound::InboundExecutor;
use crate::lease::RunLease;
use crate::outbound::OutboundDrain;
use crate::scheduler::{Scheduler, SyncRequest};
use crate::scoring::PriorityScorer;
use crate::steps::Orchestrator;
use crate::worker::SyncWorker;
use core_runtime::EventBus;
use core_store::{
    SqliteChangeQueueRepository, SqliteFieldMappingRepository, SqliteRecordRepository,
    SqliteStepResultRepository, SqliteSyncLogRepository, SqliteTenantRepository,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A running sync engine.
pub struct SyncEngine {
    cancel: CancellationToken,
    scheduler_handle: JoinHandle<()>,
    worker_handle: JoinHandle<()>,
    events: EventBus,
    requests: mpsc::Sender<SyncRequest>,
}

impl SyncEngine {
    /// Start the engine over an initialized pool.
    ///
    /// Spawns the scheduler tick loop and the worker loop; both run until
    /// [`shutdown`](Self::shutdown).
    pub fn start(
        pool: SqlitePool,
        clients: Arc<dyn RemoteClientFactory>,
        scorer: Arc<dyn PriorityScorer>,
        config: EngineConfig,
    ) -> Self {
        let tenants = Arc::new(SqliteTenantRepository::new(pool.clone()));
        let mappings = Arc::new(SqliteFieldMappingRepository::new(pool.clone()));
        let records = Arc::new(SqliteRecordRepository::new(pool.clone()));
        let change_queue = Arc::new(SqliteChangeQueueRepository::new(pool.clone()));
        let sync_logs = Arc::new(SqliteSyncLogRepository::new(pool.clone()));
        let step_results = Arc::new(SqliteStepResultRepository::new(pool));

        let inbound = Arc::new(InboundExecutor::new(
            tenants.clone(),
            mappings,
            records,
            sync_logs.clone(),
            step_results.clone(),
            clients.clone(),
            scorer,
            config.step_timeout,
        ));
        let outbound = Arc::new(OutboundDrain::new(
            tenants.clone(),
            change_queue,
            sync_logs,
            step_results.clone(),
            clients,
            config.outbound_batch_size,
            config.max_outbound_attempts,
            config.step_timeout,
        ));

        let orchestrator = Orchestrator::new(
            config.max_run_attempts,
            config.retry_base_delay,
            config.retry_max_delay,
        );

        let events = EventBus::default();
        let (requests, request_rx) = mpsc::channel(config.request_channel_capacity);
        let cancel = CancellationToken::new();

        let scheduler = Scheduler::new(tenants, requests.clone(), config.tick_interval);
        let scheduler_handle = tokio::spawn(scheduler.run(cancel.clone()));

        let worker = Arc::new(SyncWorker::new(
            inbound,
            outbound,
            orchestrator,
            Arc::new(RunLease::new()),
            step_results,
            events.clone(),
        ));
        let worker_handle = tokio::spawn(worker.run(request_rx, cancel.clone()));

        info!("Sync engine started");
        Self {
            cancel,
            scheduler_handle,
            worker_handle,
            events,
            requests,
        }
    }

    /// The engine's event bus; subscribe to observe run lifecycles.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Sender for dispatching sync requests outside the scheduler's cadence,
    /// e.g. a push drain after a local edit.
    pub fn request_sender(&self) -> mpsc::Sender<SyncRequest> {
        self.requests.clone()
    }

    /// Stop the scheduler and worker and wait for them to exit.
    ///
    /// In-flight runs finish on their own tasks; durable steps make them
    /// safe to abandon mid-run regardless.
    pub async fn shutdown(self) {
        info!("Sync engine shutting down");
        self.cancel.cancel();
        let _ = self.scheduler_handle.await;
        let _ = self.worker_handle.await;
    }
}
