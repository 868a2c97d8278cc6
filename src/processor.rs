//! Queue drain: replays pending records through the dual-backend delivery.
//!
//! A [`QueueProcessor`] owns a [`DrainGate`]; at most one drain runs per
//! processor and a finished drain starts a cooldown window. The engine keeps
//! a single processor for the life of the process, so the gate is the
//! process-wide single-flight guard.

use crate::backend::{RelationalBackend, SheetBackend};
use crate::config::SyncPolicy;
use crate::connectivity::{probe_with_retries, Connectivity};
use crate::dispatch::{deliver_row, Delivery};
use crate::duplicate::DuplicateDetector;
use crate::normalize::ensure_canonical_id;
use crate::resolve::{build_row, is_structurally_invalid};
use crate::store::catalog::{Catalog, CatalogStore};
use crate::store::queue::PersistedQueue;
use crate::types::{DrainReport, DrainSkip, RegistrationRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Single-flight flag plus the end time of the last drain.
pub struct DrainGate {
    draining: AtomicBool,
    last_finished: Mutex<Option<Instant>>,
    cooldown: Duration,
}

impl DrainGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            draining: AtomicBool::new(false),
            last_finished: Mutex::new(None),
            cooldown,
        }
    }

    /// Claim the gate. The guard releases it and stamps the cooldown on drop.
    pub fn try_enter(&self) -> std::result::Result<DrainGuard<'_>, DrainSkip> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DrainSkip::Busy);
        }

        let cooling = self
            .last_finished
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some_and(|t| t.elapsed() < self.cooldown);
        if cooling {
            self.draining.store(false, Ordering::SeqCst);
            return Err(DrainSkip::CoolingDown);
        }

        Ok(DrainGuard { gate: self })
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

pub struct DrainGuard<'a> {
    gate: &'a DrainGate,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        *self
            .gate
            .last_finished
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        self.gate.draining.store(false, Ordering::SeqCst);
    }
}

enum Step {
    Continue,
    Stop,
}

pub struct QueueProcessor {
    gate: DrainGate,
    connectivity: Arc<dyn Connectivity>,
    sheet: Arc<dyn SheetBackend>,
    relational: Arc<dyn RelationalBackend>,
    queue: Arc<PersistedQueue>,
    catalog: Arc<CatalogStore>,
    detector: Arc<DuplicateDetector>,
    policy: SyncPolicy,
}

impl QueueProcessor {
    pub fn new(
        connectivity: Arc<dyn Connectivity>,
        sheet: Arc<dyn SheetBackend>,
        relational: Arc<dyn RelationalBackend>,
        queue: Arc<PersistedQueue>,
        catalog: Arc<CatalogStore>,
        detector: Arc<DuplicateDetector>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            gate: DrainGate::new(policy.drain_cooldown),
            connectivity,
            sheet,
            relational,
            queue,
            catalog,
            detector,
            policy,
        }
    }

    pub fn is_draining(&self) -> bool {
        self.gate.is_draining()
    }

    /// Attempt every pending record once, in enqueue order.
    ///
    /// Returns immediately with a skipped report when another drain is running,
    /// when the last one finished inside the cooldown window, or when the
    /// connectivity probes all fail.
    pub async fn drain(&self) -> DrainReport {
        let _guard = match self.gate.try_enter() {
            Ok(guard) => guard,
            Err(reason) => {
                tracing::debug!("[DRAIN] skipped: {:?}", reason);
                return DrainReport::skipped(reason);
            }
        };

        let items = match self.queue.list() {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("[DRAIN] cannot read queue: {}", e);
                return DrainReport::default();
            }
        };
        if items.is_empty() {
            return DrainReport::default();
        }

        let online = probe_with_retries(
            self.connectivity.as_ref(),
            self.policy.connectivity_probes,
            self.policy.probe_backoff,
        )
        .await;
        if !online {
            tracing::info!("[DRAIN] offline, {} records stay queued", items.len());
            let mut report = DrainReport::skipped(DrainSkip::Offline);
            report.remaining = items.len();
            return report;
        }

        tracing::info!("[DRAIN] processing {} queued records", items.len());
        let catalog = self.catalog.snapshot();
        let mut report = DrainReport::default();

        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.policy.item_delay).await;
            }
            if !self.connectivity.is_online().await {
                tracing::warn!("[DRAIN] connectivity lost, stopping");
                report.interrupted = true;
                break;
            }
            if let Step::Stop = self.process_item(item, &catalog, &mut report).await {
                report.interrupted = true;
                break;
            }
        }

        report.remaining = self.queue.len().unwrap_or_else(|e| {
            tracing::error!("[DRAIN] cannot count queue: {}", e);
            0
        });
        tracing::info!(
            "[DRAIN] done: {} delivered, {} duplicates, {} failed, {} dropped, {} deferred, {} remaining",
            report.succeeded,
            report.duplicates,
            report.failed,
            report.dropped,
            report.deferred,
            report.remaining
        );
        report
    }

    async fn process_item(
        &self,
        mut item: RegistrationRecord,
        catalog: &Catalog,
        report: &mut DrainReport,
    ) -> Step {
        if is_structurally_invalid(&item, catalog) {
            tracing::warn!("[DRAIN] dropping invalid record {}", item.id);
            self.forget(&item.id);
            report.dropped += 1;
            return Step::Continue;
        }

        let stored_id = item.id.clone();
        if ensure_canonical_id(&mut item) {
            self.forget(&stored_id);
            if let Err(e) = self.queue.enqueue(item.clone()) {
                tracing::error!("[DRAIN] cannot requeue {} as {}: {}", stored_id, item.id, e);
            }
        }

        if let Some(found) = self.detector.find_remote(&item).await {
            if found.existing_id.as_deref() != Some(item.id.as_str()) {
                tracing::warn!("[DRAIN] {} already registered remotely: {}", item.id, found);
                self.forget(&item.id);
                report.duplicates += 1;
                return Step::Continue;
            }
        }

        let row = match build_row(&item, catalog) {
            Ok(row) => row,
            Err(e) => {
                tracing::info!("[DRAIN] deferring {} until references load: {}", item.id, e);
                report.deferred += 1;
                return Step::Continue;
            }
        };

        match deliver_row(self.sheet.as_ref(), self.relational.as_ref(), &row).await {
            Delivery::Delivered => {
                tracing::info!("[DRAIN] delivered {}", item.id);
                self.forget(&item.id);
                report.succeeded += 1;
            }
            Delivery::Duplicate(e) => {
                tracing::warn!("[DRAIN] {} rejected as duplicate: {}", item.id, e);
                self.forget(&item.id);
                report.duplicates += 1;
            }
            Delivery::Network(e) => {
                tracing::warn!("[DRAIN] network failure on {}: {}", item.id, e);
                return Step::Stop;
            }
            Delivery::Invalid(e) => {
                tracing::warn!("[DRAIN] dropping {} rejected as invalid: {}", item.id, e);
                self.forget(&item.id);
                report.dropped += 1;
            }
            Delivery::Failed(e) => {
                tracing::warn!("[DRAIN] delivery of {} failed: {}", item.id, e);
                self.record_failure(item, report);
            }
        }
        Step::Continue
    }

    /// Count a failed attempt; the record is removed once it reaches the limit.
    fn record_failure(&self, mut item: RegistrationRecord, report: &mut DrainReport) {
        item.attempt_count += 1;
        if item.attempt_count >= self.policy.max_attempts {
            tracing::warn!(
                "[DRAIN] giving up on {} after {} attempts",
                item.id,
                item.attempt_count
            );
            self.forget(&item.id);
            report.dropped += 1;
            return;
        }
        if let Err(e) = self.queue.update(&item) {
            tracing::error!("[DRAIN] cannot record attempt for {}: {}", item.id, e);
        }
        report.failed += 1;
    }

    fn forget(&self, id: &str) {
        if let Err(e) = self.queue.remove(id) {
            tracing::error!("[DRAIN] cannot remove {} from queue: {}", id, e);
        }
    }
}
