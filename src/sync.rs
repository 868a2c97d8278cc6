//! Full sync: reference refresh followed by one queue drain, plus the
//! background loop that triggers it when connectivity comes back.

use crate::backend::{ReferenceSource, SessionProvider};
use crate::config::SyncPolicy;
use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::processor::QueueProcessor;
use crate::store::catalog::CatalogStore;
use crate::types::{RefreshReport, SyncRunStatus, SyncSummary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct SyncOrchestrator {
    connectivity: Arc<dyn Connectivity>,
    session: Arc<dyn SessionProvider>,
    references: Arc<dyn ReferenceSource>,
    catalog: Arc<CatalogStore>,
    processor: Arc<QueueProcessor>,
    policy: SyncPolicy,
    last_seen_online: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(
        connectivity: Arc<dyn Connectivity>,
        session: Arc<dyn SessionProvider>,
        references: Arc<dyn ReferenceSource>,
        catalog: Arc<CatalogStore>,
        processor: Arc<QueueProcessor>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            connectivity,
            session,
            references,
            catalog,
            processor,
            policy,
            last_seen_online: AtomicBool::new(false),
        }
    }

    /// Offline and missing-session conditions come back as a status, never an error.
    pub async fn sync_all(&self) -> SyncSummary {
        if !self.connectivity.is_online().await {
            tracing::info!("[SYNC] offline, nothing to do");
            return SyncSummary::not_run(SyncRunStatus::Offline);
        }
        if !self.session.has_valid_session().await {
            tracing::warn!("[SYNC] no valid session, skipping sync");
            return SyncSummary::not_run(SyncRunStatus::NoSession);
        }

        let references = self.refresh_references().await;
        let drain = self.processor.drain().await;

        tracing::info!(
            "[SYNC] complete: {} reference sets refreshed, {} failed, {} records delivered",
            references.refreshed.len(),
            references.failed.len(),
            drain.succeeded
        );
        SyncSummary {
            status: SyncRunStatus::Completed,
            references,
            drain: Some(drain),
        }
    }

    /// Refresh every reference set; a failure in one leaves the others untouched.
    pub async fn refresh_references(&self) -> RefreshReport {
        let mut report = RefreshReport::default();

        let communities: Result<()> = async {
            let items = self.references.communities().await?;
            self.catalog.replace_communities(items)
        }
        .await;
        record("communities", communities, &mut report);

        let roles: Result<()> = async {
            let items = self.references.roles().await?;
            self.catalog.replace_roles(items)
        }
        .await;
        record("roles", roles, &mut report);

        let instruments: Result<()> = async {
            let items = self.references.instruments().await?;
            self.catalog.replace_instruments(items)
        }
        .await;
        record("instruments", instruments, &mut report);

        let people: Result<()> = async {
            let items = self.references.people().await?;
            self.catalog.replace_people(items)
        }
        .await;
        record("people", people, &mut report);

        report
    }

    /// Poll connectivity once; runs `sync_all` on an offline -> online edge.
    pub async fn check_transition(&self) -> Option<SyncSummary> {
        let online = self.connectivity.is_online().await;
        let was_online = self.last_seen_online.swap(online, Ordering::SeqCst);
        match (was_online, online) {
            (false, true) => {
                tracing::info!("[SYNC] connectivity restored, syncing");
                Some(self.sync_all().await)
            }
            (true, false) => {
                tracing::info!("[SYNC] connectivity lost");
                None
            }
            _ => None,
        }
    }

    /// Background loop: polls every `monitor_interval` until the task is dropped.
    pub async fn start_monitor_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.policy.monitor_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Some(summary) = self.check_transition().await {
                tracing::debug!("[SYNC] monitor run finished: {:?}", summary.status);
            }
        }
    }
}

fn record(name: &str, result: Result<()>, report: &mut RefreshReport) {
    match result {
        Ok(()) => report.refreshed.push(name.to_string()),
        Err(e) => {
            tracing::warn!("[SYNC] failed to refresh {}: {}", name, e);
            report.failed.push(name.to_string());
        }
    }
}
