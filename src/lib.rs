//! # rollsync
//!
//! Offline-first write queue and dual-backend sync engine for attendance
//! registrations.
//!
//! Every registration goes to an append-only spreadsheet service and to a
//! relational store with a uniqueness constraint. Records submitted without
//! connectivity, or whose delivery failed, wait in a persisted queue that is
//! drained once connectivity returns. Same-day duplicates (same person,
//! community and role on one local calendar day) are rejected before any
//! write when the check can see them, and by the relational constraint when
//! it cannot.
//!
//! The HTTP adapters live in `rollsync-backends`; this crate only sees the
//! traits in [`backend`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rollsync::{EngineParts, LocalCalendar, MemorySlotStore, RegistrationRecord, SyncEngine, SyncPolicy};
//! use std::sync::Arc;
//!
//! # async fn run(parts: EngineParts) {
//! let engine = SyncEngine::new(
//!     parts,
//!     Arc::new(MemorySlotStore::new()),
//!     LocalCalendar::from_offset_minutes(-180),
//!     SyncPolicy::default(),
//! );
//!
//! let record = RegistrationRecord::new("p1", "c1", "r1", chrono::Utc::now());
//! let outcome = engine.create_registration(record).await;
//! if outcome.is_blocking() {
//!     eprintln!("{}", outcome.user_message());
//! }
//!
//! let summary = engine.sync_all().await;
//! println!("{:?}", summary.status);
//! # }
//! ```

pub mod backend;
pub mod calendar;
pub mod config;
pub mod connectivity;
pub mod dispatch;
pub mod duplicate;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod processor;
pub mod resolve;
pub mod store;
pub mod sync;
pub mod types;

pub use backend::{BackendResult, ReferenceSource, RelationalBackend, SessionProvider, SheetBackend};
pub use calendar::{DayWindow, LocalCalendar};
pub use config::{SyncConfig, SyncPolicy};
pub use connectivity::{probe_with_retries, Connectivity, ConnectivityFlag, HttpProbe};
pub use engine::{EngineParts, SyncEngine};
pub use error::{BackendError, BackendErrorKind, Result, SyncError};
pub use store::catalog::{Catalog, CatalogStore};
pub use store::queue::{PersistedQueue, QUEUE_SLOT};
pub use store::{FileSlotStore, MemorySlotStore, SlotStore};
pub use types::*;

use once_cell::sync::OnceCell;
use std::sync::Arc;

static GLOBAL_ENGINE: OnceCell<Arc<SyncEngine>> = OnceCell::new();

/// Install the process-wide engine (called once during startup).
///
/// Later calls are ignored; the first engine stays installed for the life of
/// the process.
pub fn set_global_engine(engine: Arc<SyncEngine>) {
    let _ = GLOBAL_ENGINE.set(engine);
}

/// The process-wide engine, if one was installed.
pub fn global_engine() -> Option<Arc<SyncEngine>> {
    GLOBAL_ENGINE.get().map(Arc::clone)
}
