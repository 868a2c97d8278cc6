use crate::backend::{ReferenceSource, RelationalBackend, SessionProvider, SheetBackend};
use crate::calendar::LocalCalendar;
use crate::config::{SyncConfig, SyncPolicy};
use crate::connectivity::Connectivity;
use crate::dispatch::Dispatcher;
use crate::duplicate::DuplicateDetector;
use crate::error::Result;
use crate::processor::QueueProcessor;
use crate::store::catalog::{Catalog, CatalogStore};
use crate::store::queue::PersistedQueue;
use crate::store::{FileSlotStore, SlotStore};
use crate::sync::SyncOrchestrator;
use crate::types::{DrainReport, Outcome, RefreshReport, RegistrationRecord, SyncSummary};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// External collaborators the engine is wired to.
#[derive(Clone)]
pub struct EngineParts {
    pub connectivity: Arc<dyn Connectivity>,
    pub sheet: Arc<dyn SheetBackend>,
    pub relational: Arc<dyn RelationalBackend>,
    pub references: Arc<dyn ReferenceSource>,
    pub session: Arc<dyn SessionProvider>,
}

/// One queue, one catalog and one drain gate per engine.
pub struct SyncEngine {
    queue: Arc<PersistedQueue>,
    catalog: Arc<CatalogStore>,
    dispatcher: Dispatcher,
    processor: Arc<QueueProcessor>,
    orchestrator: Arc<SyncOrchestrator>,
    calendar: LocalCalendar,
}

impl SyncEngine {
    pub fn new(
        parts: EngineParts,
        store: Arc<dyn SlotStore>,
        calendar: LocalCalendar,
        policy: SyncPolicy,
    ) -> Arc<Self> {
        let queue = Arc::new(PersistedQueue::new(Arc::clone(&store)));
        let catalog = Arc::new(CatalogStore::open(store));
        let detector = Arc::new(DuplicateDetector::new(
            Arc::clone(&queue),
            Arc::clone(&catalog),
            Arc::clone(&parts.relational),
            calendar,
            policy.duplicate_check_timeout,
        ));

        let dispatcher = Dispatcher::new(
            Arc::clone(&parts.connectivity),
            Arc::clone(&parts.sheet),
            Arc::clone(&parts.relational),
            Arc::clone(&queue),
            Arc::clone(&catalog),
            Arc::clone(&detector),
        );
        let processor = Arc::new(QueueProcessor::new(
            Arc::clone(&parts.connectivity),
            parts.sheet,
            parts.relational,
            Arc::clone(&queue),
            Arc::clone(&catalog),
            detector,
            policy.clone(),
        ));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            parts.connectivity,
            parts.session,
            parts.references,
            Arc::clone(&catalog),
            Arc::clone(&processor),
            policy,
        ));

        Arc::new(Self {
            queue,
            catalog,
            dispatcher,
            processor,
            orchestrator,
            calendar,
        })
    }

    /// Engine persisting its queue and catalog under `config.data_dir`.
    pub fn open(parts: EngineParts, config: &SyncConfig, policy: SyncPolicy) -> Result<Arc<Self>> {
        let store = FileSlotStore::open(&config.data_dir)?;
        let calendar = LocalCalendar::from_offset_minutes(config.utc_offset_minutes);
        tracing::info!(
            "[SYNC] engine opened at {} (device {})",
            config.data_dir.display(),
            config.device_id
        );
        Ok(Self::new(parts, Arc::new(store), calendar, policy))
    }

    pub async fn create_registration(&self, record: RegistrationRecord) -> Outcome {
        self.dispatcher.create_registration(record).await
    }

    pub async fn sync_all(&self) -> SyncSummary {
        self.orchestrator.sync_all().await
    }

    pub async fn drain(&self) -> DrainReport {
        self.processor.drain().await
    }

    pub async fn refresh_references(&self) -> RefreshReport {
        self.orchestrator.refresh_references().await
    }

    /// Pending records in enqueue order.
    pub fn pending(&self) -> Result<Vec<RegistrationRecord>> {
        self.queue.list()
    }

    pub fn pending_count(&self) -> Result<usize> {
        self.queue.len()
    }

    pub fn is_draining(&self) -> bool {
        self.processor.is_draining()
    }

    pub fn catalog(&self) -> Catalog {
        self.catalog.snapshot()
    }

    pub fn catalog_store(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn calendar(&self) -> &LocalCalendar {
        &self.calendar
    }

    /// Spawn the connectivity monitor. Abort the handle to stop it.
    pub fn spawn_monitor(&self) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.orchestrator).start_monitor_loop())
    }
}
