//! # Inbound Sync Executor
//!
//! Pulls changed records from the remote system into the local mirror for
//! one tenant. A run is a fixed sequence of durable steps:
//!
//! 1. `load-tenant` / `load-mappings`: no-op when the tenant is missing or
//!    sync is disabled (no log row is written for a skip)
//! 2. `open-log`: open the audit row; from here failures close it `failed`
//! 3. `compute-cursor`: snapshot the cursor window at the run start instant
//! 4. `fetch-remote`: list records modified strictly after the cursor
//! 5. `upsert-records`: key-field projection, natural-key upsert, scoring
//! 6. `advance-cursor`: move the cursor to the run start instant
//! 7. `close-log`: terminal `completed` with counts
//!
//! Every step replays its stored output on retry, so a run interrupted after
//! the fetch re-enters at the upsert without hitting the remote API again.
//! A fetch failure leaves the cursor untouched; records changed in the
//! failed window are picked up by the next successful run.

use crate::clients::RemoteClientFactory;
use crate::error::Result;
use crate::scoring::PriorityScorer;
use crate::steps::StepRunner;
use core_store::{
    now_timestamp, FieldMapping, FieldMappingRepository, RecordRepository, RecordUpsert,
    StepResultRepository, SyncDirection, SyncLogId, SyncLogRepository, SyncRunId, Tenant, TenantId,
    TenantRepository,
};
use chrono::{DateTime, Utc};
use remote_traits::{FieldMap, RemoteRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Result of one inbound run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Tenant missing or sync disabled; nothing was done and no log written
    Skipped,
    /// Run finished; cursor advanced and log closed `completed`
    Completed {
        /// Number of records upserted
        records_processed: u64,
    },
}

/// Cursor window snapshotted at the start of a run.
///
/// `run_started_at` becomes the new cursor on success. Anything modified
/// while the run is in flight lands after it and is fetched next time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CursorWindow {
    since: Option<i64>,
    run_started_at: i64,
}

/// Executes inbound sync runs.
pub struct InboundExecutor {
    tenants: Arc<dyn TenantRepository>,
    mappings: Arc<dyn FieldMappingRepository>,
    records: Arc<dyn RecordRepository>,
    sync_logs: Arc<dyn SyncLogRepository>,
    step_results: Arc<dyn StepResultRepository>,
    clients: Arc<dyn RemoteClientFactory>,
    scorer: Arc<dyn PriorityScorer>,
    step_timeout: Duration,
}

impl InboundExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        mappings: Arc<dyn FieldMappingRepository>,
        records: Arc<dyn RecordRepository>,
        sync_logs: Arc<dyn SyncLogRepository>,
        step_results: Arc<dyn StepResultRepository>,
        clients: Arc<dyn RemoteClientFactory>,
        scorer: Arc<dyn PriorityScorer>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            tenants,
            mappings,
            records,
            sync_logs,
            step_results,
            clients,
            scorer,
            step_timeout,
        }
    }

    /// Run one inbound sync for a tenant.
    ///
    /// Re-entrant under the same `run_id`: completed steps replay instead of
    /// re-executing.
    ///
    /// # Errors
    ///
    /// Returns the failing step's error. The sync log (if opened) is driven
    /// to `failed` first; the cursor is never advanced on failure.
    #[instrument(skip(self))]
    pub async fn run(&self, tenant_id: &TenantId, run_id: &SyncRunId) -> Result<PullOutcome> {
        let runner = StepRunner::new(self.step_results.clone(), *run_id, self.step_timeout);

        let tenant: Option<Tenant> = runner
            .run("load-tenant", || async {
                Ok(self.tenants.find_by_id(tenant_id).await?)
            })
            .await?;

        let Some(tenant) = tenant else {
            debug!("Tenant not found, skipping pull");
            return Ok(PullOutcome::Skipped);
        };
        if !tenant.sync_enabled {
            debug!("Sync disabled for tenant, skipping pull");
            return Ok(PullOutcome::Skipped);
        }

        let mappings: Vec<FieldMapping> = runner
            .run("load-mappings", || async {
                Ok(self.mappings.list_for_tenant(&tenant.id).await?)
            })
            .await?;

        let log_id: SyncLogId = runner
            .run("open-log", || async {
                Ok(self.sync_logs.open(&tenant.id, SyncDirection::Pull).await?)
            })
            .await?;

        match self.run_logged(&runner, &tenant, &mappings, &log_id).await {
            Ok(records_processed) => {
                info!(records_processed, "Pull completed");
                Ok(PullOutcome::Completed { records_processed })
            }
            Err(e) => {
                // Best effort; the run error is the one worth surfacing
                if let Err(log_err) = self.sync_logs.fail(&log_id, &e.to_string()).await {
                    warn!(error = %log_err, "Failed to close sync log after run failure");
                }
                Err(e)
            }
        }
    }

    /// Steps between log open and log close; errors here fail the log.
    async fn run_logged(
        &self,
        runner: &StepRunner,
        tenant: &Tenant,
        mappings: &[FieldMapping],
        log_id: &SyncLogId,
    ) -> Result<u64> {
        let window: CursorWindow = runner
            .run("compute-cursor", || async {
                Ok(CursorWindow {
                    since: tenant.last_sync_at,
                    run_started_at: now_timestamp(),
                })
            })
            .await?;

        let client = self.clients.client_for(tenant);

        let fetched: Vec<RemoteRecord> = runner
            .run("fetch-remote", || async {
                let since = window.since.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0));
                Ok(client.list_changed(&tenant.table_id, since).await?)
            })
            .await?;

        let records_processed: u64 = runner
            .run("upsert-records", || async {
                let mut count = 0u64;
                let synced_at = now_timestamp();
                for record in &fetched {
                    let key_fields = project_key_fields(&record.fields, mappings);
                    let stored = self
                        .records
                        .upsert(&RecordUpsert {
                            tenant_id: tenant.id,
                            remote_record_id: record.id.clone(),
                            custom_fields: record.fields.clone(),
                            key_fields,
                            synced_at,
                        })
                        .await?;

                    if let Some(score) = self.scorer.score(&stored.custom_fields, mappings) {
                        self.records.set_priority_score(&stored.id, Some(score)).await?;
                    }
                    count += 1;
                }
                Ok(count)
            })
            .await?;

        // An empty fetch still advances the cursor; the window was checked
        runner
            .run("advance-cursor", || async {
                self.tenants
                    .advance_cursor(&tenant.id, window.run_started_at)
                    .await?;
                Ok(())
            })
            .await?;

        runner
            .run("close-log", || async {
                self.sync_logs
                    .complete(log_id, records_processed as i64, 0)
                    .await?;
                Ok(())
            })
            .await?;

        Ok(records_processed)
    }
}

/// Project the key-field subset out of a full field bag.
///
/// A field belongs to the projection when a mapping marks it visible in
/// list views and the bag carries it. Values are copied as-is, nulls
/// included.
fn project_key_fields(fields: &FieldMap, mappings: &[FieldMapping]) -> FieldMap {
    let mut projection = FieldMap::new();
    for mapping in mappings {
        if !mapping.visible_in_list {
            continue;
        }
        if let Some(value) = fields.get(&mapping.remote_field_name) {
            projection.insert(mapping.remote_field_name.clone(), value.clone());
        }
    }
    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::{MappingId, TenantId};
    use serde_json::json;

    fn mapping(name: &str, visible_in_list: bool) -> FieldMapping {
        FieldMapping {
            id: MappingId::new(),
            tenant_id: TenantId::new(),
            remote_field_id: format!("fld_{}", name),
            remote_field_name: name.to_string(),
            remote_field_type: "singleLineText".to_string(),
            display_name: name.to_string(),
            visible_in_list,
            visible_in_detail: true,
            sort_order: None,
            priority_weight: 0.0,
            created_at: 0,
        }
    }

    #[test]
    fn test_key_field_projection_follows_visibility() {
        let mut fields = FieldMap::new();
        fields.insert("Name".to_string(), json!("Ada"));
        fields.insert("Email".to_string(), json!("ada@example.com"));
        fields.insert("Notes".to_string(), json!("internal"));

        let mappings = [
            mapping("Name", true),
            mapping("Email", true),
            mapping("Notes", false),
            mapping("Missing", true),
        ];

        let projection = project_key_fields(&fields, &mappings);
        assert_eq!(projection.len(), 2);
        assert_eq!(projection.get("Name"), Some(&json!("Ada")));
        assert_eq!(projection.get("Email"), Some(&json!("ada@example.com")));
        assert!(!projection.contains_key("Notes"));
        assert!(!projection.contains_key("Missing"));
    }

    #[test]
    fn test_key_field_projection_keeps_nulls() {
        let mut fields = FieldMap::new();
        fields.insert("Name".to_string(), json!(null));

        let projection = project_key_fields(&fields, &[mapping("Name", true)]);
        assert_eq!(projection.get("Name"), Some(&json!(null)));
    }

    #[test]
    fn test_cursor_window_roundtrip() {
        let window = CursorWindow {
            since: Some(1_700_000_000),
            run_started_at: 1_700_000_900,
        };
        let raw = serde_json::to_string(&window).unwrap();
        let back: CursorWindow = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.since, Some(1_700_000_000));
        assert_eq!(back.run_started_at, 1_700_000_900);
    }
}
