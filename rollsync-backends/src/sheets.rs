use super::classify;
use super::types::{ExportRefreshRequest, SheetAppendRequest, SheetResponse, SheetRow};
use async_trait::async_trait;
use rollsync::{AttendanceRow, BackendError, BackendResult, LocalCalendar, SheetBackend};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_SHEET: &str = "Dados";

const EXPORT_OPS: &[(&str, &str)] = &[
    ("Itapevi", "exportar_completo_itapevi"),
    ("Caucaia do Alto", "exportar_completo_caucaia"),
    ("Jandira", "exportar_completo_jandira"),
    ("Fazendinha", "exportar_completo_fazendinha"),
    ("Pirapora", "exportar_completo_pirapora"),
    ("Vargem Grande", "exportar_completo_vargemgrande"),
    ("Cotia", "exportar_completo_cotia"),
];

/// Export operation for a rehearsal location; unknown locations use Itapevi's.
pub fn export_op_for(location: &str) -> &'static str {
    let location = location.trim();
    EXPORT_OPS
        .iter()
        .find(|(name, _)| *name == location)
        .map(|(_, op)| *op)
        .unwrap_or(EXPORT_OPS[0].1)
}

/// HTTP client for the spreadsheet web service
pub struct SheetsClient {
    url: String,
    sheet: String,
    calendar: LocalCalendar,
    http_client: reqwest::Client,
}

impl SheetsClient {
    pub fn new(url: impl Into<String>, calendar: LocalCalendar) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            url: url.into(),
            sheet: DEFAULT_SHEET.to_string(),
            calendar,
            http_client,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = sheet.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn sheet_row(&self, row: &AttendanceRow) -> SheetRow {
        SheetRow {
            uuid: row.uuid.clone(),
            full_name: row.full_name.clone(),
            community: row.community.clone(),
            role: row.role.clone(),
            instrument: row.instrument.clone().unwrap_or_default(),
            location: row.location.to_uppercase(),
            recorded_at: format!(
                "{} {}",
                self.calendar.format_date(row.recorded_at),
                self.calendar.format_time(row.recorded_at)
            ),
            submitted_by: row.submitted_by.clone(),
        }
    }

    /// Ask the sheet to rebuild the roster export for `location`.
    /// Fire-and-forget: failures are only logged.
    pub fn request_export_refresh(&self, location: &str) -> JoinHandle<()> {
        let req = ExportRefreshRequest {
            op: export_op_for(location).to_string(),
            local_ensaio: location.trim().to_string(),
        };
        let http_client = self.http_client.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            match http_client.post(&url).json(&req).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!("[SHEETS] export refresh {} requested for {}", req.op, req.local_ensaio);
                }
                Ok(resp) => {
                    tracing::warn!(
                        "[SHEETS] export refresh {} answered {}",
                        req.op,
                        resp.status()
                    );
                }
                Err(e) => {
                    tracing::warn!("[SHEETS] export refresh {} failed: {}", req.op, e);
                }
            }
        })
    }
}

#[async_trait]
impl SheetBackend for SheetsClient {
    async fn append_row(&self, row: &AttendanceRow) -> BackendResult<()> {
        let req = SheetAppendRequest {
            op: "append".to_string(),
            sheet: self.sheet.clone(),
            row: self.sheet_row(row),
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| classify::from_transport("sheet", &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify::from_transport("sheet", &e))?;

        if !status.is_success() {
            return Err(BackendError::new(
                classify::status_kind(status),
                format!("sheet returned {}: {}", status, body.trim()),
            ));
        }

        if let Ok(parsed) = serde_json::from_str::<SheetResponse>(&body) {
            if parsed.ok == Some(false) {
                let message = parsed
                    .error
                    .unwrap_or_else(|| "sheet rejected the row".to_string());
                return Err(classify::from_sheet_error(&message));
            }
        }

        tracing::debug!("[SHEETS] appended {}", row.uuid);
        Ok(())
    }
}
