//! Named-slot storage: the durable layer under the queue and the catalog.
//!
//! A slot holds one JSON document. Implementations must make `write` atomic
//! with respect to readers: a crash mid-write leaves either the old or the new
//! document, never a torn one.

pub mod catalog;
pub mod queue;

use crate::error::{Result, SyncError};
use dashmap::DashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub trait SlotStore: Send + Sync {
    /// `None` when the slot has never been written or was removed.
    fn read(&self, slot: &str) -> Result<Option<String>>;
    fn write(&self, slot: &str, contents: &str) -> Result<()>;
    fn remove(&self, slot: &str) -> Result<()>;
}

fn validate_slot_name(slot: &str) -> Result<()> {
    let ok = !slot.is_empty()
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(SyncError::Storage(format!("invalid slot name: {:?}", slot)))
    }
}

/// One `{slot}.json` file per slot under a directory.
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }
}

impl SlotStore for FileSlotStore {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        validate_slot_name(slot)?;
        match fs::read_to_string(self.slot_path(slot)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, slot: &str, contents: &str) -> Result<()> {
        validate_slot_name(slot)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.slot_path(slot))
            .map_err(|e| SyncError::Storage(format!("persist {}: {}", slot, e.error)))?;
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<()> {
        validate_slot_name(slot)?;
        match fs::remove_file(self.slot_path(slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local slots, for tests and for clients that persist elsewhere.
#[derive(Default)]
pub struct MemorySlotStore {
    slots: DashMap<String, String>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemorySlotStore {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        validate_slot_name(slot)?;
        Ok(self.slots.get(slot).map(|v| v.value().clone()))
    }

    fn write(&self, slot: &str, contents: &str) -> Result<()> {
        validate_slot_name(slot)?;
        self.slots.insert(slot.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<()> {
        validate_slot_name(slot)?;
        self.slots.remove(slot);
        Ok(())
    }
}
