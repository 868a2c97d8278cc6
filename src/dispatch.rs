//! Submission path: duplicate check, then dual delivery or enqueue.

use crate::backend::{RelationalBackend, SheetBackend};
use crate::connectivity::Connectivity;
use crate::duplicate::DuplicateDetector;
use crate::error::{BackendError, BackendErrorKind};
use crate::normalize::ensure_canonical_id;
use crate::resolve::{build_row, resolve_names};
use crate::store::catalog::CatalogStore;
use crate::store::queue::PersistedQueue;
use crate::types::{
    AttendanceRow, DuplicateInfo, DuplicateSource, Outcome, QueueReason, RegistrationRecord,
    SyncStatus,
};
use std::sync::Arc;

/// How one delivery attempt of a row ended, after both backends answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Delivered,
    /// The relational store reported a uniqueness violation.
    Duplicate(BackendError),
    /// The spreadsheet (or, on fallback, the relational store) was unreachable.
    Network(BackendError),
    /// The payload was rejected as malformed and the fallback did not land it.
    Invalid(BackendError),
    Failed(BackendError),
}

/// Spreadsheet first, relational second, both sent concurrently.
///
/// Both writes are awaited before deciding. A spreadsheet success delivers
/// the row even if the relational insert failed, unless that failure was a
/// constraint violation. On a non-network spreadsheet failure the relational
/// result already in hand is the fallback; it is not re-sent.
pub async fn deliver_row(
    sheet: &dyn SheetBackend,
    relational: &dyn RelationalBackend,
    row: &AttendanceRow,
) -> Delivery {
    let (sheet_result, relational_result) = tokio::join!(sheet.append_row(row), relational.insert(row));

    match (sheet_result, relational_result) {
        (Ok(()), Ok(())) => Delivery::Delivered,
        (Ok(()), Err(e)) if e.is_constraint() => Delivery::Duplicate(e),
        (Ok(()), Err(e)) => {
            tracing::warn!(
                "[DISPATCH] {} reached the sheet; relational insert failed: {}",
                row.uuid,
                e
            );
            Delivery::Delivered
        }
        (Err(sheet_err), _) if sheet_err.is_network() => Delivery::Network(sheet_err),
        (Err(sheet_err), Ok(())) => {
            tracing::warn!(
                "[DISPATCH] {} sheet failed ({}), delivered via relational fallback",
                row.uuid,
                sheet_err
            );
            Delivery::Delivered
        }
        (Err(_), Err(rel_err)) if rel_err.is_constraint() => Delivery::Duplicate(rel_err),
        (Err(_), Err(rel_err)) if rel_err.is_network() => Delivery::Network(rel_err),
        (Err(sheet_err), Err(rel_err)) => {
            tracing::warn!(
                "[DISPATCH] {} failed on both backends: sheet={}, relational={}",
                row.uuid,
                sheet_err,
                rel_err
            );
            if sheet_err.kind == BackendErrorKind::Validation
                || rel_err.kind == BackendErrorKind::Validation
            {
                Delivery::Invalid(sheet_err)
            } else {
                Delivery::Failed(sheet_err)
            }
        }
    }
}

pub struct Dispatcher {
    connectivity: Arc<dyn Connectivity>,
    sheet: Arc<dyn SheetBackend>,
    relational: Arc<dyn RelationalBackend>,
    queue: Arc<PersistedQueue>,
    catalog: Arc<CatalogStore>,
    detector: Arc<DuplicateDetector>,
}

impl Dispatcher {
    pub fn new(
        connectivity: Arc<dyn Connectivity>,
        sheet: Arc<dyn SheetBackend>,
        relational: Arc<dyn RelationalBackend>,
        queue: Arc<PersistedQueue>,
        catalog: Arc<CatalogStore>,
        detector: Arc<DuplicateDetector>,
    ) -> Self {
        Self {
            connectivity,
            sheet,
            relational,
            queue,
            catalog,
            detector,
        }
    }

    /// Entry point for a new registration coming from the UI.
    ///
    /// Only `RejectedDuplicate` (and `Fatal`, when nothing could be stored)
    /// should block the user.
    pub async fn create_registration(&self, mut record: RegistrationRecord) -> Outcome {
        ensure_canonical_id(&mut record);
        record.sync_status = SyncStatus::Pending;
        record.attempt_count = 0;

        if let Err(e) = record.validate() {
            tracing::warn!("[DISPATCH] rejecting malformed registration {}: {}", record.id, e);
            return Outcome::Fatal(e.to_string());
        }

        let online = self.connectivity.is_online().await;

        if let Some(found) = self.detector.find_duplicate(&record, online).await {
            tracing::warn!("[DISPATCH] {} blocked as duplicate: {}", record.id, found);
            return Outcome::RejectedDuplicate(found);
        }

        self.dispatch(record, online).await
    }

    /// Deliver or enqueue a record that already passed duplicate detection.
    pub async fn dispatch(&self, mut record: RegistrationRecord, online: bool) -> Outcome {
        ensure_canonical_id(&mut record);

        if !online {
            tracing::info!("[DISPATCH] offline, queueing {}", record.id);
            return self.enqueue(record, QueueReason::Offline);
        }

        let catalog = self.catalog.snapshot();
        let row = match build_row(&record, &catalog) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("[DISPATCH] cannot build row for {}: {}, queueing", record.id, e);
                return self.enqueue(record, QueueReason::Unresolved);
            }
        };

        match deliver_row(self.sheet.as_ref(), self.relational.as_ref(), &row).await {
            Delivery::Delivered => {
                tracing::info!("[DISPATCH] delivered {}", record.id);
                Outcome::Delivered
            }
            Delivery::Duplicate(e) => {
                tracing::warn!("[DISPATCH] {} rejected by relational constraint: {}", record.id, e);
                Outcome::RejectedDuplicate(self.constraint_details(&record).await)
            }
            Delivery::Network(e) => {
                tracing::warn!("[DISPATCH] network failure for {}: {}, queueing", record.id, e);
                self.enqueue(record, QueueReason::NetworkError)
            }
            Delivery::Invalid(e) | Delivery::Failed(e) => {
                tracing::error!("[DISPATCH] both backends failed for {}: {}, queueing", record.id, e);
                self.enqueue(record, QueueReason::BackendsFailed)
            }
        }
    }

    fn enqueue(&self, record: RegistrationRecord, reason: QueueReason) -> Outcome {
        let id = record.id.clone();
        match self.queue.enqueue(record) {
            Ok(()) => Outcome::Queued(reason),
            Err(e) => {
                tracing::error!("[DISPATCH] could not persist {} locally: {}", id, e);
                Outcome::Fatal(e.to_string())
            }
        }
    }

    /// Details for a constraint rejection: the existing record's time when the
    /// store can tell us, the candidate's otherwise.
    async fn constraint_details(&self, record: &RegistrationRecord) -> DuplicateInfo {
        if let Some(mut found) = self.detector.find_remote(record).await {
            found.source = DuplicateSource::Constraint;
            return found;
        }
        let catalog = self.catalog.snapshot();
        let names = resolve_names(record, &catalog).ok();
        self.detector.describe(
            names.as_ref(),
            record.manual_name().unwrap_or(&record.person_ref),
            &record.community_ref,
            record.timestamp,
            DuplicateSource::Constraint,
        )
    }
}
