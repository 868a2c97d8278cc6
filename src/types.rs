use crate::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking a person typed by hand instead of picked from the catalog.
pub const MANUAL_PREFIX: &str = "manual_";

/// Prefix marking a community outside the local catalog.
pub const EXTERNAL_PREFIX: &str = "external_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Delivered,
}

/// One attendance registration: the unit of work for the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub id: String,
    pub person_ref: String,
    pub community_ref: String,
    pub role_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_ref: Option<String>,
    #[serde(default)]
    pub location: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub submitted_by: String,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub attempt_count: u32,
}

impl RegistrationRecord {
    pub fn new(
        person_ref: impl Into<String>,
        community_ref: impl Into<String>,
        role_ref: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            person_ref: person_ref.into(),
            community_ref: community_ref.into(),
            role_ref: role_ref.into(),
            instrument_ref: None,
            location: String::new(),
            timestamp,
            submitted_by: String::new(),
            sync_status: SyncStatus::Pending,
            attempt_count: 0,
        }
    }

    /// Record for a person typed by hand: the ref becomes `manual_<name>`.
    pub fn manual(
        typed_name: &str,
        community_ref: impl Into<String>,
        role_ref: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(
            format!("{}{}", MANUAL_PREFIX, typed_name.trim()),
            community_ref,
            role_ref,
            timestamp,
        )
    }

    pub fn with_instrument(mut self, instrument_ref: impl Into<String>) -> Self {
        self.instrument_ref = Some(instrument_ref.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_submitted_by(mut self, submitted_by: impl Into<String>) -> Self {
        self.submitted_by = submitted_by.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// The typed name when the person was entered by hand.
    pub fn manual_name(&self) -> Option<&str> {
        self.person_ref.strip_prefix(MANUAL_PREFIX)
    }

    pub fn is_external_community(&self) -> bool {
        self.community_ref.starts_with(EXTERNAL_PREFIX)
    }

    pub fn is_pending(&self) -> bool {
        self.sync_status == SyncStatus::Pending
    }

    /// Structural check of the required references.
    pub fn validate(&self) -> Result<()> {
        if self.person_ref.trim().is_empty() || self.manual_name().is_some_and(|n| n.trim().is_empty())
        {
            return Err(SyncError::MissingReference("person_ref".into()));
        }
        if self.community_ref.trim().is_empty() {
            return Err(SyncError::MissingReference("community_ref".into()));
        }
        if self.role_ref.trim().is_empty() {
            return Err(SyncError::MissingReference("role_ref".into()));
        }
        Ok(())
    }

    /// Same person, community and role refs. Day comparison is left to the caller.
    pub fn same_refs(&self, other: &RegistrationRecord) -> bool {
        self.person_ref == other.person_ref
            && self.community_ref == other.community_ref
            && self.role_ref == other.role_ref
    }
}

/// Result of handing a record to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Delivered,
    Queued(QueueReason),
    RejectedDuplicate(DuplicateInfo),
    /// The record could not even be stored locally.
    Fatal(String),
}

impl Outcome {
    /// Only duplicates block the user; everything else reads as "saved".
    pub fn is_blocking(&self) -> bool {
        matches!(self, Outcome::RejectedDuplicate(_) | Outcome::Fatal(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            Outcome::Delivered => "Registration delivered".to_string(),
            Outcome::Queued(QueueReason::Offline) => {
                "Saved locally. It will sync when the connection is back.".to_string()
            }
            Outcome::Queued(_) => {
                "Saved locally. It will sync automatically when possible.".to_string()
            }
            Outcome::RejectedDuplicate(info) => format!("DUPLICATE:{}", info.signal()),
            Outcome::Fatal(msg) => format!("Could not save registration: {}", msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueReason {
    Offline,
    NetworkError,
    BackendsFailed,
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateSource {
    Remote,
    LocalQueue,
    Constraint,
}

/// What the caller needs to explain a duplicate rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateInfo {
    pub name: String,
    pub community: String,
    /// `dd/mm/yyyy` of the existing record.
    pub date: String,
    /// `HH:MM` of the existing record.
    pub time: String,
    pub source: DuplicateSource,
    /// Id of the record already holding the slot, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<String>,
}

impl DuplicateInfo {
    /// `name|community|date|time`, the single-string rejection signal.
    pub fn signal(&self) -> String {
        format!("{}|{}|{}|{}", self.name, self.community, self.date, self.time)
    }
}

impl std::fmt::Display for DuplicateInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) already registered on {} at {}",
            self.name, self.community, self.date, self.time
        )
    }
}

/// Why a drain request did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainSkip {
    Busy,
    CoolingDown,
    Offline,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub succeeded: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub dropped: usize,
    /// Left queued untouched because the cached catalog cannot name their refs yet.
    #[serde(default)]
    pub deferred: usize,
    pub remaining: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<DrainSkip>,
    pub interrupted: bool,
}

impl DrainReport {
    pub fn skipped(reason: DrainSkip) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }

    pub fn ran(&self) -> bool {
        self.skipped.is_none()
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.duplicates + self.failed + self.dropped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Completed,
    Offline,
    NoSession,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub status: SyncRunStatus,
    pub references: RefreshReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain: Option<DrainReport>,
}

impl SyncSummary {
    pub fn not_run(status: SyncRunStatus) -> Self {
        Self {
            status,
            references: RefreshReport::default(),
            drain: None,
        }
    }
}

// Reference data kept in the local catalog.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_id: Option<String>,
    /// Role the person actually performs, when it differs from the selected one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_role: Option<String>,
}

/// Flat row delivered to both backends once refs are resolved to names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRow {
    pub uuid: String,
    pub full_name: String,
    pub community: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    pub location: String,
    pub recorded_at: DateTime<Utc>,
    pub submitted_by: String,
}

/// Same-day lookup against the relational store. Values are already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateQuery {
    pub name: String,
    pub community: String,
    pub role: String,
    pub day_start: DateTime<Utc>,
    pub day_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingAttendance {
    pub uuid: String,
    pub full_name: String,
    pub community: String,
    pub role: String,
    pub recorded_at: DateTime<Utc>,
}
