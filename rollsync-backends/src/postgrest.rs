use super::classify;
use super::types::{AttendanceInsert, AttendanceMatch, NamedRow, PersonRow};
use async_trait::async_trait;
use rollsync::{
    AttendanceRow, BackendError, BackendResult, Community, DuplicateQuery, ExistingAttendance,
    Instrument, Person, ReferenceSource, RelationalBackend, Role,
};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_TABLE: &str = "presencas";

/// PostgREST client for the attendance table and the reference tables
pub struct PostgrestClient {
    base_url: String,
    api_key: String,
    table: String,
    http_client: reqwest::Client,
}

impl PostgrestClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            table: DEFAULT_TABLE.to_string(),
            http_client,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> BackendResult<Vec<T>> {
        let response = self
            .authorized(self.http_client.get(self.endpoint(table)))
            .query(query)
            .send()
            .await
            .map_err(|e| classify::from_transport("database", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify::from_postgrest(status, &body));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| BackendError::unknown(format!("unreadable {} rows: {}", table, e)))
    }
}

#[async_trait]
impl RelationalBackend for PostgrestClient {
    async fn insert(&self, row: &AttendanceRow) -> BackendResult<()> {
        let payload = AttendanceInsert::from(row);
        let response = self
            .authorized(self.http_client.post(self.endpoint(&self.table)))
            .header("Prefer", "return=minimal")
            .json(&payload)
            .send()
            .await
            .map_err(|e| classify::from_transport("database", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify::from_postgrest(status, &body));
        }

        tracing::debug!("[DB] inserted {}", row.uuid);
        Ok(())
    }

    async fn find_same_day(&self, query: &DuplicateQuery) -> BackendResult<Option<ExistingAttendance>> {
        let params = [
            ("select", "uuid,nome_completo,comum,cargo,data_ensaio,created_at".to_string()),
            ("nome_completo", format!("eq.{}", query.name)),
            ("comum", format!("eq.{}", query.community)),
            ("cargo", format!("eq.{}", query.role)),
            ("data_ensaio", format!("gte.{}", query.day_start.to_rfc3339())),
            ("data_ensaio", format!("lt.{}", query.day_end.to_rfc3339())),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<AttendanceMatch> = self.select(&self.table, &params).await?;
        Ok(rows.into_iter().find_map(AttendanceMatch::into_existing))
    }
}

#[async_trait]
impl ReferenceSource for PostgrestClient {
    async fn communities(&self) -> BackendResult<Vec<Community>> {
        let rows: Vec<NamedRow> = self.select("comuns", &[("select", "id,nome".into())]).await?;
        Ok(rows.into_iter().map(Community::from).collect())
    }

    async fn roles(&self) -> BackendResult<Vec<Role>> {
        let rows: Vec<NamedRow> = self.select("cargos", &[("select", "id,nome".into())]).await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn instruments(&self) -> BackendResult<Vec<Instrument>> {
        let rows: Vec<NamedRow> = self
            .select("instrumentos", &[("select", "id,nome".into())])
            .await?;
        Ok(rows.into_iter().map(Instrument::from).collect())
    }

    async fn people(&self) -> BackendResult<Vec<Person>> {
        let rows: Vec<PersonRow> = self
            .select(
                "pessoas",
                &[("select", "id,nome_completo,comum_id,cargo_real".into())],
            )
            .await?;
        Ok(rows.into_iter().map(Person::from).collect())
    }
}
