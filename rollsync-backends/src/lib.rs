//! HTTP adapters for the rollsync engine: the spreadsheet web service, the
//! PostgREST relational store (attendance table and reference tables) and a
//! static session provider.

pub mod classify;
pub mod postgrest;
pub mod session;
pub mod sheets;
pub mod types;

pub use postgrest::PostgrestClient;
pub use session::StaticSession;
pub use sheets::{export_op_for, SheetsClient};

use rollsync::{Connectivity, ConnectivityFlag, EngineParts, HttpProbe, SyncConfig};
use std::sync::Arc;

/// Wire the HTTP adapters described by `config` into engine parts.
///
/// Missing URLs leave the engine permanently offline: records still queue
/// locally and nothing is sent.
pub fn parts_from_config(config: &SyncConfig, session: StaticSession) -> EngineParts {
    let calendar = rollsync::LocalCalendar::from_offset_minutes(config.utc_offset_minutes);
    let sheets = SheetsClient::new(config.sheets_url.clone().unwrap_or_default(), calendar);
    let db = Arc::new(
        PostgrestClient::new(
            config.db_url.clone().unwrap_or_default(),
            config.db_key.clone().unwrap_or_default(),
        )
        .with_table(config.db_table.clone()),
    );

    let probe_target = config
        .probe_url
        .clone()
        .or_else(|| config.sheets_url.clone())
        .or_else(|| config.db_url.clone());
    let connectivity: Arc<dyn Connectivity> = match probe_target {
        Some(url) if config.sheets_url.is_some() && config.db_url.is_some() => {
            Arc::new(HttpProbe::new(url))
        }
        _ => {
            tracing::warn!("[NET] backends not configured, staying offline");
            Arc::new(ConnectivityFlag::new(false))
        }
    };

    EngineParts {
        connectivity,
        sheet: Arc::new(sheets),
        relational: db.clone(),
        references: db,
        session: Arc::new(session),
    }
}
