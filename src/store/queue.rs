//! Durable queue of registrations waiting for delivery.

use super::SlotStore;
use crate::error::{Result, SyncError};
use crate::types::{RegistrationRecord, SyncStatus};
use std::sync::{Arc, Mutex};

pub const QUEUE_SLOT: &str = "pending_registrations";

/// Ordered, durable set of pending records, keyed by id.
///
/// Every mutation is a read-modify-write of the whole slot under one lock, so
/// the on-disk array is always the authoritative state.
pub struct PersistedQueue {
    store: Arc<dyn SlotStore>,
    lock: Mutex<()>,
}

impl PersistedQueue {
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Vec<RegistrationRecord>> {
        let Some(raw) = self.store.read(QUEUE_SLOT)? else {
            return Ok(Vec::new());
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Vec::new());
        }
        serde_json::from_str(trimmed)
            .map_err(|e| SyncError::Storage(format!("corrupt queue slot: {}", e)))
    }

    fn save(&self, records: &[RegistrationRecord]) -> Result<()> {
        if records.is_empty() {
            return self.store.remove(QUEUE_SLOT);
        }
        let json = serde_json::to_string(records)?;
        self.store.write(QUEUE_SLOT, &json)
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded state lives in the store, so a poisoned lock is still usable.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pending records in insertion order.
    pub fn list(&self) -> Result<Vec<RegistrationRecord>> {
        let _g = self.guard();
        Ok(self.load()?.into_iter().filter(|r| r.is_pending()).collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, id: &str) -> Result<Option<RegistrationRecord>> {
        let _g = self.guard();
        Ok(self.load()?.into_iter().find(|r| r.id == id))
    }

    /// Add a record as pending. An entry with the same id is replaced in place.
    pub fn enqueue(&self, mut record: RegistrationRecord) -> Result<()> {
        if record.sync_status == SyncStatus::Delivered {
            return Err(SyncError::AlreadyDelivered(record.id));
        }
        record.sync_status = SyncStatus::Pending;

        let _g = self.guard();
        let mut records = self.load()?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        self.save(&records)?;
        tracing::info!(
            "[QUEUE] enqueued {} (attempts={}, size={})",
            record.id,
            record.attempt_count,
            records.len()
        );
        Ok(())
    }

    /// Overwrite an existing entry. Returns false if the id is not queued.
    pub fn update(&self, record: &RegistrationRecord) -> Result<bool> {
        let _g = self.guard();
        let mut records = self.load()?;
        let Some(existing) = records.iter_mut().find(|r| r.id == record.id) else {
            return Ok(false);
        };
        *existing = record.clone();
        self.save(&records)?;
        Ok(true)
    }

    /// Returns false if the id was not queued.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let _g = self.guard();
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records)?;
        tracing::debug!("[QUEUE] removed {} (size={})", id, records.len());
        Ok(true)
    }

    pub fn find_pending<F>(&self, mut predicate: F) -> Result<Option<RegistrationRecord>>
    where
        F: FnMut(&RegistrationRecord) -> bool,
    {
        let _g = self.guard();
        Ok(self
            .load()?
            .into_iter()
            .find(|r| r.is_pending() && predicate(r)))
    }

    pub fn clear(&self) -> Result<()> {
        let _g = self.guard();
        self.store.remove(QUEUE_SLOT)
    }
}
