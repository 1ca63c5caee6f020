//! IntegrationWorker: one reconciliation and retrieval cycle.
//!
//! A cycle refreshes the order-code mapping from a trailing period export,
//! loads a batch of pending items and processes them on blocking threads,
//! at most `pool_size` at a time. Each item has its own deadline; an item
//! that fails or times out is counted and audited without touching its
//! siblings. Nothing is written back for failed items, so they are retried
//! on the next cycle.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::Semaphore;
use uuid::Uuid;

use super::artifacts::plan_attachments;
use super::error::ItemError;
use super::retrieval::{retrieve_with_fallback, YearFallback};
use super::traits::{AuditSink, PendingItemSource, RecordStore};
use super::types::{CancelFlag, CycleOutcome, CycleState, ItemOutcome};
use crate::config::{DocumentConfig, WorkerConfig};
use crate::db::DatabaseError;
use crate::models::{AuditEntry, AuditOutcome, PendingItem};
use crate::reconcile::{MappingStore, ReconciliationMapper};
use crate::sink::{AttachRequest, DocumentSink, SinkError};
use crate::soap::LabGateway;

/// Store seams a worker is wired to.
pub struct WorkerStores {
    pub pending: Arc<dyn PendingItemSource>,
    pub records: Arc<dyn RecordStore>,
    pub mappings: Arc<dyn MappingStore>,
    pub sink: Arc<dyn DocumentSink>,
    pub audit: Arc<dyn AuditSink>,
}

impl WorkerStores {
    /// Wire every seam to one store implementing all of them.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: PendingItemSource + RecordStore + MappingStore + DocumentSink + AuditSink + 'static,
    {
        Self {
            pending: store.clone(),
            records: store.clone(),
            mappings: store.clone(),
            sink: store.clone(),
            audit: store,
        }
    }
}

/// Everything an item task needs, shared with blocking threads.
struct ItemContext {
    gateway: Arc<dyn LabGateway>,
    records: Arc<dyn RecordStore>,
    sink: Arc<dyn DocumentSink>,
    mapper: ReconciliationMapper,
    worker: WorkerConfig,
    documents: DocumentConfig,
}

impl ItemContext {
    fn refresh_window(&self, hours: u32) -> Result<usize, DatabaseError> {
        let end = Local::now().naive_local();
        let start = end - chrono::Duration::hours(i64::from(hours));
        match self
            .gateway
            .fetch_period_results(start, end, self.worker.mapping_include_graphics)
        {
            Some(raw) => self.mapper.refresh(&raw),
            None => {
                tracing::warn!(hours, "Period results unavailable, mapping may be stale");
                Ok(0)
            }
        }
    }

    fn process_item(&self, item: &PendingItem, cancel: &CancelFlag) -> Result<ItemOutcome, ItemError> {
        let code = item.local_order_code.as_str();

        let Some(mapping) = self.mapper.lookup(code)? else {
            tracing::info!(order = code, "Order not yet reconciled, deferring");
            return Ok(ItemOutcome::Deferred);
        };

        if !self.records.encounter_exists(item.encounter_id)? {
            return Err(ItemError::EncounterNotFound {
                encounter_id: item.encounter_id,
            });
        }
        let patient_id = self.records.patient_for_encounter(item.encounter_id)?;

        let policy = YearFallback::new(self.worker.default_year, self.worker.year_fallback)
            .with_hint(mapping.order_year);
        let result = retrieve_with_fallback(
            self.gateway.as_ref(),
            &mapping.remote_order_code,
            &policy,
            cancel,
        )?
        .with_local_code(code);
        let remote_key = result.key();

        let mut document_ids = Vec::new();
        let mut skipped = 0;
        for plan in plan_attachments(&result, &self.documents) {
            if cancel.is_cancelled() {
                return Err(ItemError::Cancelled);
            }

            if self.records.hash_exists(plan.content_hash, plan.kind)? {
                tracing::info!(
                    order = %remote_key,
                    kind = plan.kind.as_str(),
                    hash = plan.content_hash,
                    "Artifact already attached, skipping"
                );
                skipped += 1;
                continue;
            }

            let request = AttachRequest {
                content: plan.content,
                extension: plan.extension,
                encounter_id: item.encounter_id,
                patient_id,
                description: &plan.description,
                file_name: &plan.file_name,
                document_type_code: plan.document_type_code,
                content_hash: plan.content_hash,
                kind: plan.kind,
                author: &self.documents.author,
                origin: &self.documents.origin,
            };
            match self.sink.attach(&request) {
                Ok(document_id) => {
                    tracing::info!(
                        order = %remote_key,
                        document_id,
                        encounter_id = item.encounter_id,
                        file = %plan.file_name,
                        "Artifact attached"
                    );
                    document_ids.push(document_id);
                }
                // Lost a race with another attach of the same content.
                Err(SinkError::Duplicate { .. }) => {
                    tracing::info!(order = %remote_key, hash = plan.content_hash, "Artifact attached concurrently, skipping");
                    skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(ItemOutcome::Attached {
            remote_key,
            document_ids,
            skipped,
        })
    }
}

pub struct IntegrationWorker {
    ctx: Arc<ItemContext>,
    pending: Arc<dyn PendingItemSource>,
    audit: Arc<dyn AuditSink>,
    state: Mutex<CycleState>,
    cycle_lock: tokio::sync::Mutex<()>,
    processed: AtomicU32,
    errors: AtomicU32,
}

impl IntegrationWorker {
    pub fn new(
        gateway: Arc<dyn LabGateway>,
        stores: WorkerStores,
        worker: WorkerConfig,
        documents: DocumentConfig,
    ) -> Self {
        let ctx = ItemContext {
            gateway,
            records: stores.records,
            sink: stores.sink,
            mapper: ReconciliationMapper::new(stores.mappings),
            worker,
            documents,
        };
        Self {
            ctx: Arc::new(ctx),
            pending: stores.pending,
            audit: stores.audit,
            state: Mutex::new(CycleState::Idle),
            cycle_lock: tokio::sync::Mutex::new(()),
            processed: AtomicU32::new(0),
            errors: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> CycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: CycleState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        tracing::debug!(state = %state, "Cycle state");
    }

    /// Items completed in the last (or current) cycle.
    pub fn processed(&self) -> u32 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Items failed in the last (or current) cycle.
    pub fn errors(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.ctx.worker
    }

    /// Process one pending item on the calling thread. Blocking.
    pub fn process_item(
        &self,
        item: &PendingItem,
        cancel: &CancelFlag,
    ) -> Result<ItemOutcome, ItemError> {
        self.ctx.process_item(item, cancel)
    }

    /// Run one full cycle and return the number of items processed.
    ///
    /// Never fails: mapping refresh problems leave the mapping stale, and a
    /// failed pending query ends the cycle with zero. A trigger that arrives
    /// while a cycle is running is dropped.
    pub async fn run_cycle(&self) -> u32 {
        let Ok(_running) = self.cycle_lock.try_lock() else {
            tracing::warn!("Previous cycle still running, skipping trigger");
            return 0;
        };

        let cycle_id = Uuid::new_v4();
        let started = Instant::now();
        self.processed.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        tracing::info!(%cycle_id, "Integration cycle starting");

        self.set_state(CycleState::RefreshingMap);
        self.refresh_mapping().await;

        self.set_state(CycleState::FetchingPending);
        let Some(items) = self.load_pending().await else {
            return self.finish(cycle_id, started).processed;
        };
        tracing::info!(count = items.len(), "Pending items loaded");

        self.set_state(CycleState::Dispatching);
        let semaphore = Arc::new(Semaphore::new(self.ctx.worker.pool_size.max(1)));
        let deadline = self.ctx.worker.item_timeout;
        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let ctx = self.ctx.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let result = run_item(ctx, semaphore, &item, deadline).await;
                    (item, result)
                })
            })
            .collect();

        self.set_state(CycleState::Awaiting);
        for handle in handles {
            match handle.await {
                Ok((item, result)) => self.record(&item, result).await,
                Err(e) => {
                    tracing::error!(error = %e, "Item task aborted");
                    self.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        self.finish(cycle_id, started).processed
    }

    async fn refresh_mapping(&self) {
        let ctx = self.ctx.clone();
        let hours = ctx.worker.mapping_window_hours;
        match tokio::task::spawn_blocking(move || ctx.refresh_window(hours)).await {
            Ok(Ok(upserted)) => tracing::debug!(upserted, "Mapping refresh done"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Mapping refresh failed, continuing"),
            Err(e) => tracing::warn!(error = %e, "Mapping refresh task failed, continuing"),
        }
    }

    async fn load_pending(&self) -> Option<Vec<PendingItem>> {
        let pending = self.pending.clone();
        let limit = self.ctx.worker.batch_size;
        match tokio::task::spawn_blocking(move || pending.list_pending(limit)).await {
            Ok(Ok(items)) => Some(items),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Cannot load pending items, cycle aborted");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Pending query task failed, cycle aborted");
                None
            }
        }
    }

    /// Count, log and audit one item result. Deferred items leave no trace.
    async fn record(&self, item: &PendingItem, result: Result<ItemOutcome, ItemError>) {
        let entry = match result {
            Ok(ItemOutcome::Deferred) => return,
            Ok(ItemOutcome::Attached {
                remote_key,
                document_ids,
                skipped,
            }) => {
                self.processed.fetch_add(1, Ordering::Relaxed);
                AuditEntry {
                    outcome: AuditOutcome::Success,
                    local_order_code: item.local_order_code.clone(),
                    remote_key: Some(remote_key),
                    encounter_id: Some(item.encounter_id),
                    detail: format!("documents={document_ids:?} skipped={skipped}"),
                }
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(order = %item.local_order_code, error = %e, "Item failed");
                AuditEntry {
                    outcome: AuditOutcome::Error,
                    local_order_code: item.local_order_code.clone(),
                    remote_key: None,
                    encounter_id: Some(item.encounter_id),
                    detail: e.to_string(),
                }
            }
        };

        emit_audit(&entry);
        let audit = self.audit.clone();
        match tokio::task::spawn_blocking(move || audit.record(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Audit entry not persisted"),
            Err(e) => tracing::warn!(error = %e, "Audit task failed"),
        }
    }

    fn finish(&self, cycle_id: Uuid, started: Instant) -> CycleOutcome {
        self.set_state(CycleState::Done);
        let outcome = CycleOutcome {
            processed: self.processed(),
            errors: self.errors(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            %cycle_id,
            processed = outcome.processed,
            errors = outcome.errors,
            duration_ms = outcome.duration_ms,
            "Integration cycle finished"
        );
        self.set_state(CycleState::Idle);
        outcome
    }
}

/// Wait for a pool slot, then run the item on a blocking thread under its
/// deadline. The slot is held until the blocking work actually returns.
async fn run_item(
    ctx: Arc<ItemContext>,
    semaphore: Arc<Semaphore>,
    item: &PendingItem,
    deadline: Duration,
) -> Result<ItemOutcome, ItemError> {
    let permit = semaphore
        .acquire_owned()
        .await
        .map_err(|_| ItemError::Cancelled)?;

    let cancel = CancelFlag::new();
    let task = {
        let cancel = cancel.clone();
        let item = item.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            ctx.process_item(&item, &cancel)
        })
    };

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ItemError::TaskFailed(e.to_string())),
        Err(_) => {
            cancel.cancel();
            let after_ms = deadline.as_millis() as u64;
            tracing::warn!(order = %item.local_order_code, after_ms, "Item timed out, cancelling");
            Err(ItemError::TimedOut { after_ms })
        }
    }
}

fn emit_audit(entry: &AuditEntry) {
    let remote_key = entry.remote_key.as_deref().unwrap_or("-");
    match entry.outcome {
        AuditOutcome::Success => tracing::info!(
            target: "audit",
            outcome = %entry.outcome,
            order = %entry.local_order_code,
            remote_key,
            encounter_id = ?entry.encounter_id,
            detail = %entry.detail,
            "Item processed"
        ),
        AuditOutcome::Error => tracing::warn!(
            target: "audit",
            outcome = %entry.outcome,
            order = %entry.local_order_code,
            remote_key,
            encounter_id = ?entry.encounter_id,
            detail = %entry.detail,
            "Item failed"
        ),
    }
}
