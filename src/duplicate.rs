//! Same person / community / role / day detection, remote store first, local
//! queue second.
//!
//! The two checks are not atomic with each other or across devices. Two
//! devices can both pass detection inside the race window; the relational
//! uniqueness constraint then reports the loser as a duplicate after the fact.

use crate::backend::RelationalBackend;
use crate::calendar::LocalCalendar;
use crate::normalize::normalize_for_match;
use crate::resolve::{resolve_names, ResolvedNames};
use crate::store::catalog::{Catalog, CatalogStore};
use crate::store::queue::PersistedQueue;
use crate::types::{
    DuplicateInfo, DuplicateQuery, DuplicateSource, RegistrationRecord, EXTERNAL_PREFIX,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub struct DuplicateDetector {
    queue: Arc<PersistedQueue>,
    catalog: Arc<CatalogStore>,
    relational: Arc<dyn RelationalBackend>,
    calendar: LocalCalendar,
    remote_timeout: Duration,
}

impl DuplicateDetector {
    pub fn new(
        queue: Arc<PersistedQueue>,
        catalog: Arc<CatalogStore>,
        relational: Arc<dyn RelationalBackend>,
        calendar: LocalCalendar,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            catalog,
            relational,
            calendar,
            remote_timeout,
        }
    }

    /// Remote check when `online`, then the local queue regardless.
    pub async fn find_duplicate(
        &self,
        candidate: &RegistrationRecord,
        online: bool,
    ) -> Option<DuplicateInfo> {
        if online {
            if let Some(found) = self.find_remote(candidate).await {
                return Some(found);
            }
        }
        self.find_local(candidate)
    }

    /// Normalized same-day query for `candidate`, or `None` if its refs cannot be named.
    pub fn query_for(&self, candidate: &RegistrationRecord, catalog: &Catalog) -> Option<DuplicateQuery> {
        let names = resolve_names(candidate, catalog).ok()?;
        let window = self.calendar.day_window(candidate.timestamp);
        Some(DuplicateQuery {
            name: normalize_for_match(&names.person),
            community: normalize_for_match(&names.community),
            role: normalize_for_match(&names.effective_role),
            day_start: window.start,
            day_end: window.end,
        })
    }

    /// Bounded lookup in the relational store. Timeouts and errors mean "no signal".
    pub async fn find_remote(&self, candidate: &RegistrationRecord) -> Option<DuplicateInfo> {
        let catalog = self.catalog.snapshot();
        let Some(query) = self.query_for(candidate, &catalog) else {
            tracing::debug!(
                "[DUP] {} has unresolved refs, skipping remote check",
                candidate.id
            );
            return None;
        };

        let lookup = self.relational.find_same_day(&query);
        match tokio::time::timeout(self.remote_timeout, lookup).await {
            Ok(Ok(Some(existing))) => {
                tracing::warn!(
                    "[DUP] remote duplicate for {}: {} / {} / {} (existing {})",
                    candidate.id,
                    query.name,
                    query.community,
                    query.role,
                    existing.uuid
                );
                let names = resolve_names(candidate, &catalog).ok();
                let mut info = self.describe(
                    names.as_ref(),
                    &existing.full_name,
                    &existing.community,
                    existing.recorded_at,
                    DuplicateSource::Remote,
                );
                info.existing_id = Some(existing.uuid);
                Some(info)
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                tracing::warn!("[DUP] remote check failed for {}: {}", candidate.id, e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "[DUP] remote check for {} timed out after {:?}, continuing",
                    candidate.id,
                    self.remote_timeout
                );
                None
            }
        }
    }

    /// Pending record in the queue with the same refs on the same local day.
    pub fn find_local(&self, candidate: &RegistrationRecord) -> Option<DuplicateInfo> {
        let found = self.queue.find_pending(|r| {
            r.id != candidate.id
                && r.same_refs(candidate)
                && self.calendar.same_day(r.timestamp, candidate.timestamp)
        });
        let existing = match found {
            Ok(Some(existing)) => existing,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("[DUP] local queue check failed: {}", e);
                return None;
            }
        };

        tracing::warn!(
            "[DUP] local duplicate for {}: pending {}",
            candidate.id,
            existing.id
        );
        let catalog = self.catalog.snapshot();
        let names = resolve_names(&existing, &catalog).ok();
        let fallback_name = existing
            .manual_name()
            .unwrap_or(&existing.person_ref)
            .to_string();
        let mut info = self.describe(
            names.as_ref(),
            &fallback_name,
            &existing.community_ref,
            existing.timestamp,
            DuplicateSource::LocalQueue,
        );
        info.existing_id = Some(existing.id);
        Some(info)
    }

    /// Rejection details, preferring display names over stored forms.
    pub fn describe(
        &self,
        names: Option<&ResolvedNames>,
        fallback_name: &str,
        fallback_community: &str,
        existing_at: DateTime<Utc>,
        source: DuplicateSource,
    ) -> DuplicateInfo {
        let (name, community) = match names {
            Some(n) => (n.person.clone(), n.community.clone()),
            None => (
                fallback_name.to_string(),
                fallback_community
                    .trim_start_matches(EXTERNAL_PREFIX)
                    .to_string(),
            ),
        };
        DuplicateInfo {
            name,
            community,
            date: self.calendar.format_date(existing_at),
            time: self.calendar.format_time(existing_at),
            source,
            existing_id: None,
        }
    }

    pub fn calendar(&self) -> &LocalCalendar {
        &self.calendar
    }
}
