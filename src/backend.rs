//! Seams to the outside world. The engine only talks to these traits; the
//! HTTP adapters live in the `rollsync-backends` crate.

use crate::error::BackendError;
use crate::types::{AttendanceRow, Community, DuplicateQuery, ExistingAttendance, Instrument, Person, Role};
use async_trait::async_trait;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Append-only spreadsheet service. Primary delivery target.
#[async_trait]
pub trait SheetBackend: Send + Sync {
    async fn append_row(&self, row: &AttendanceRow) -> BackendResult<()>;
}

/// Relational store with a uniqueness constraint on (name, community, role, day).
#[async_trait]
pub trait RelationalBackend: Send + Sync {
    /// Constraint violations must come back as `BackendErrorKind::Constraint`.
    async fn insert(&self, row: &AttendanceRow) -> BackendResult<()>;

    /// First record matching the normalized triple inside the day window.
    async fn find_same_day(&self, query: &DuplicateQuery) -> BackendResult<Option<ExistingAttendance>>;
}

/// Source of the reference sets cached in the catalog.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn communities(&self) -> BackendResult<Vec<Community>>;
    async fn roles(&self) -> BackendResult<Vec<Role>>;
    async fn instruments(&self) -> BackendResult<Vec<Instrument>>;
    async fn people(&self) -> BackendResult<Vec<Person>>;
}

/// Answers whether a usable credential is available right now.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn has_valid_session(&self) -> bool;
}
