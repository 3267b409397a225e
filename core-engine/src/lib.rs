//! # Sync Engine
//!
//! Tenant-scoped bidirectional sync between the local mirror store and a
//! remote record system.
//!
//! ## Overview
//!
//! - **Scheduler**: periodic scan for due tenants, fire-and-forget dispatch
//! - **Inbound executor**: incremental pull, key-field projection,
//!   natural-key upsert, cursor advancement
//! - **Outbound drain**: bounded FIFO batches of queued local edits, pushed
//!   with per-item failure isolation
//! - **Durable steps**: every run is a sequence of named steps whose outputs
//!   persist, so retried runs replay completed work instead of redoing it
//!
//! [`SyncEngine`] wires all of it over one SQLite pool; the pieces are also
//! usable individually.

pub mod clients;
pub mod config;
pub mod engine;
pub mod error;
pub mod inbound;
pub mod lease;
pub mod outbound;
pub mod scheduler;
pub mod scoring;
pub mod steps;
pub mod worker;

pub use clients::{AirtableClientFactory, RemoteClientFactory};
pub use config::EngineConfig;
pub use engine::SyncEngine;
pub use error::{EngineError, Result};
pub use inbound::{InboundExecutor, PullOutcome};
pub use lease::{LeaseGuard, RunLease};
pub use outbound::{OutboundDrain, PushOutcome};
pub use scheduler::{Scheduler, SyncRequest};
pub use scoring::{NoopScorer, PriorityScorer, WeightScorer};
pub use steps::{Orchestrator, StepRunner};
pub use worker::SyncWorker;
