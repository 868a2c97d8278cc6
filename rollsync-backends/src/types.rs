use chrono::{DateTime, Utc};
use rollsync::{AttendanceRow, Community, ExistingAttendance, Instrument, Person, Role};
use serde::{Deserialize, Serialize};

/// Body POSTed to the spreadsheet service for one attendance row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetAppendRequest {
    pub op: String,
    pub sheet: String,
    pub row: SheetRow,
}

/// Spreadsheet columns, keyed by header name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetRow {
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "NOME COMPLETO")]
    pub full_name: String,
    #[serde(rename = "COMUM")]
    pub community: String,
    #[serde(rename = "CARGO")]
    pub role: String,
    #[serde(rename = "INSTRUMENTO")]
    pub instrument: String,
    #[serde(rename = "LOCAL_ENSAIO")]
    pub location: String,
    /// `dd/mm/yyyy HH:MM` in the local calendar
    #[serde(rename = "DATA_ENSAIO")]
    pub recorded_at: String,
    #[serde(rename = "REGISTRADO_POR")]
    pub submitted_by: String,
}

/// Fire-and-forget roster export trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRefreshRequest {
    pub op: String,
    pub local_ensaio: String,
}

/// Optional JSON answer of the spreadsheet service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetResponse {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Row of the attendance table as PostgREST sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceInsert {
    pub uuid: String,
    pub nome_completo: String,
    pub comum: String,
    pub cargo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrumento: Option<String>,
    pub local_ensaio: String,
    pub data_ensaio: DateTime<Utc>,
    pub registrado_por: String,
}

impl From<&AttendanceRow> for AttendanceInsert {
    fn from(row: &AttendanceRow) -> Self {
        Self {
            uuid: row.uuid.clone(),
            nome_completo: row.full_name.clone(),
            comum: row.community.clone(),
            cargo: row.role.clone(),
            instrumento: row.instrument.clone(),
            local_ensaio: row.location.clone(),
            data_ensaio: row.recorded_at,
            registrado_por: row.submitted_by.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceMatch {
    pub uuid: String,
    pub nome_completo: String,
    pub comum: String,
    pub cargo: String,
    pub data_ensaio: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AttendanceMatch {
    /// `created_at` stands in for rows written without an attendance date.
    pub fn into_existing(self) -> Option<ExistingAttendance> {
        let recorded_at = self.data_ensaio.or(self.created_at)?;
        Some(ExistingAttendance {
            uuid: self.uuid,
            full_name: self.nome_completo,
            community: self.comum,
            role: self.cargo,
            recorded_at,
        })
    }
}

/// PostgREST error body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostgrestError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRow {
    pub id: String,
    pub nome: String,
}

impl From<NamedRow> for Community {
    fn from(r: NamedRow) -> Self {
        Community { id: r.id, name: r.nome }
    }
}

impl From<NamedRow> for Role {
    fn from(r: NamedRow) -> Self {
        Role { id: r.id, name: r.nome }
    }
}

impl From<NamedRow> for Instrument {
    fn from(r: NamedRow) -> Self {
        Instrument { id: r.id, name: r.nome }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRow {
    pub id: String,
    pub nome_completo: String,
    #[serde(default)]
    pub comum_id: Option<String>,
    #[serde(default)]
    pub cargo_real: Option<String>,
}

impl From<PersonRow> for Person {
    fn from(r: PersonRow) -> Self {
        Person {
            id: r.id,
            full_name: r.nome_completo,
            community_id: r.comum_id,
            real_role: r.cargo_real.filter(|c| !c.trim().is_empty()),
        }
    }
}
