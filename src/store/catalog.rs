//! Locally cached reference data used to turn record refs into names.

use super::SlotStore;
use crate::error::Result;
use crate::types::{Community, Instrument, Person, Role};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, RwLock};

const COMMUNITIES_SLOT: &str = "catalog_communities";
const ROLES_SLOT: &str = "catalog_roles";
const INSTRUMENTS_SLOT: &str = "catalog_instruments";
const PEOPLE_SLOT: &str = "catalog_people";

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub communities: Vec<Community>,
    pub roles: Vec<Role>,
    pub instruments: Vec<Instrument>,
    pub people: Vec<Person>,
}

impl Catalog {
    pub fn community(&self, id: &str) -> Option<&Community> {
        self.communities.iter().find(|c| c.id == id)
    }

    pub fn role(&self, id: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    pub fn instrument(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    /// Communities and roles have been synced at least once.
    pub fn is_loaded(&self) -> bool {
        !self.communities.is_empty() && !self.roles.is_empty()
    }
}

/// Reference sets persisted in named slots, mirrored in memory.
pub struct CatalogStore {
    store: Arc<dyn SlotStore>,
    cache: RwLock<Catalog>,
}

impl CatalogStore {
    /// Load whatever was cached by a previous run. Unreadable slots start empty.
    pub fn open(store: Arc<dyn SlotStore>) -> Self {
        let catalog = Catalog {
            communities: load_or_empty(store.as_ref(), COMMUNITIES_SLOT),
            roles: load_or_empty(store.as_ref(), ROLES_SLOT),
            instruments: load_or_empty(store.as_ref(), INSTRUMENTS_SLOT),
            people: load_or_empty(store.as_ref(), PEOPLE_SLOT),
        };
        tracing::debug!(
            "[CATALOG] loaded communities={} roles={} instruments={} people={}",
            catalog.communities.len(),
            catalog.roles.len(),
            catalog.instruments.len(),
            catalog.people.len()
        );
        Self {
            store,
            cache: RwLock::new(catalog),
        }
    }

    pub fn snapshot(&self) -> Catalog {
        self.cache
            .read()
            .map(|c| c.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn with_cache<F: FnOnce(&mut Catalog)>(&self, f: F) {
        match self.cache.write() {
            Ok(mut c) => f(&mut c),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn replace_communities(&self, items: Vec<Community>) -> Result<()> {
        persist(self.store.as_ref(), COMMUNITIES_SLOT, &items)?;
        self.with_cache(|c| c.communities = items);
        Ok(())
    }

    pub fn replace_roles(&self, items: Vec<Role>) -> Result<()> {
        persist(self.store.as_ref(), ROLES_SLOT, &items)?;
        self.with_cache(|c| c.roles = items);
        Ok(())
    }

    pub fn replace_instruments(&self, items: Vec<Instrument>) -> Result<()> {
        persist(self.store.as_ref(), INSTRUMENTS_SLOT, &items)?;
        self.with_cache(|c| c.instruments = items);
        Ok(())
    }

    pub fn replace_people(&self, items: Vec<Person>) -> Result<()> {
        persist(self.store.as_ref(), PEOPLE_SLOT, &items)?;
        self.with_cache(|c| c.people = items);
        Ok(())
    }
}

fn load_or_empty<T: DeserializeOwned>(store: &dyn SlotStore, slot: &str) -> Vec<T> {
    match store.read(slot) {
        Ok(Some(raw)) if !raw.trim().is_empty() => match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("[CATALOG] ignoring corrupt slot {}: {}", slot, e);
                Vec::new()
            }
        },
        Ok(_) => Vec::new(),
        Err(e) => {
            tracing::warn!("[CATALOG] failed to read slot {}: {}", slot, e);
            Vec::new()
        }
    }
}

fn persist<T: Serialize>(store: &dyn SlotStore, slot: &str, items: &[T]) -> Result<()> {
    let json = serde_json::to_string(items)?;
    store.write(slot, &json)
}
