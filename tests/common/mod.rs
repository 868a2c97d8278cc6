use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rollsync::{
    AttendanceRow, BackendError, BackendResult, Community, ConnectivityFlag, DuplicateQuery,
    EngineParts, ExistingAttendance, Instrument, LocalCalendar, MemorySlotStore, Person,
    ReferenceSource, RelationalBackend, Role, SessionProvider, SheetBackend, SyncEngine,
    SyncPolicy,
};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OFFSET_MINUTES: i32 = -180;

/// 2025-03-10 10:05 local time at UTC-3.
#[allow(dead_code)]
pub fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 13, 5, 0).unwrap()
}

#[allow(dead_code)]
pub fn fast_policy() -> SyncPolicy {
    SyncPolicy {
        duplicate_check_timeout: Duration::from_millis(500),
        drain_cooldown: Duration::ZERO,
        connectivity_probes: 1,
        probe_backoff: Duration::from_millis(1),
        item_delay: Duration::from_millis(1),
        max_attempts: 3,
        monitor_interval: Duration::from_millis(20),
    }
}

#[derive(Default)]
pub struct FakeSheet {
    pub rows: Mutex<Vec<AttendanceRow>>,
    pub calls: AtomicUsize,
    scripted: Mutex<VecDeque<BackendError>>,
    always: Mutex<Option<BackendError>>,
    delay: Mutex<Duration>,
    disconnect: Mutex<Option<(usize, ConnectivityFlag)>>,
}

#[allow(dead_code)]
impl FakeSheet {
    /// Fail the next call with `err`; later calls use the normal behavior.
    pub fn fail_next(&self, err: BackendError) {
        self.scripted.lock().unwrap().push_back(err);
    }

    pub fn fail_always(&self, err: BackendError) {
        *self.always.lock().unwrap() = Some(err);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Flip `flag` offline once `appends` rows have landed.
    pub fn disconnect_after(&self, appends: usize, flag: ConnectivityFlag) {
        *self.disconnect.lock().unwrap() = Some((appends, flag));
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SheetBackend for FakeSheet {
    async fn append_row(&self, row: &AttendanceRow) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.scripted.lock().unwrap().pop_front() {
            return Err(err);
        }
        if let Some(err) = self.always.lock().unwrap().clone() {
            return Err(err);
        }

        let landed = {
            let mut rows = self.rows.lock().unwrap();
            rows.push(row.clone());
            rows.len()
        };
        if let Some((after, flag)) = self.disconnect.lock().unwrap().as_ref() {
            if landed >= *after {
                flag.set(false);
            }
        }
        Ok(())
    }
}

/// In-memory relational store enforcing the same-day uniqueness constraint.
pub struct FakeRelational {
    pub rows: Mutex<Vec<AttendanceRow>>,
    pub inserts: AtomicUsize,
    pub lookups: AtomicUsize,
    calendar: LocalCalendar,
    insert_failure: Mutex<Option<BackendError>>,
    lookup_failure: Mutex<Option<BackendError>>,
    lookup_delay: Mutex<Duration>,
    hide_lookups: Mutex<bool>,
}

impl Default for FakeRelational {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            inserts: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            calendar: LocalCalendar::from_offset_minutes(OFFSET_MINUTES),
            insert_failure: Mutex::new(None),
            lookup_failure: Mutex::new(None),
            lookup_delay: Mutex::new(Duration::ZERO),
            hide_lookups: Mutex::new(false),
        }
    }
}

#[allow(dead_code)]
impl FakeRelational {
    pub fn seed(&self, row: AttendanceRow) {
        self.rows.lock().unwrap().push(row);
    }

    pub fn fail_inserts(&self, err: BackendError) {
        *self.insert_failure.lock().unwrap() = Some(err);
    }

    pub fn fail_lookups(&self, err: BackendError) {
        *self.lookup_failure.lock().unwrap() = Some(err);
    }

    /// Hold every same-day lookup for `delay` before answering.
    pub fn stall_lookups(&self, delay: Duration) {
        *self.lookup_delay.lock().unwrap() = delay;
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Make the same-day lookup blind so only the constraint can catch duplicates.
    pub fn hide_lookups(&self) {
        *self.hide_lookups.lock().unwrap() = true;
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    fn same_slot(&self, a: &AttendanceRow, b: &AttendanceRow) -> bool {
        a.full_name == b.full_name
            && a.community == b.community
            && a.role == b.role
            && self.calendar.same_day(a.recorded_at, b.recorded_at)
    }
}

#[async_trait]
impl RelationalBackend for FakeRelational {
    async fn insert(&self, row: &AttendanceRow) -> BackendResult<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.insert_failure.lock().unwrap().clone() {
            return Err(err);
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.uuid == row.uuid || self.same_slot(r, row)) {
            return Err(BackendError::constraint(
                "duplicate key value violates unique constraint \"presencas_unique_day\"",
            ));
        }
        rows.push(row.clone());
        Ok(())
    }

    async fn find_same_day(&self, query: &DuplicateQuery) -> BackendResult<Option<ExistingAttendance>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = *self.lookup_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.lookup_failure.lock().unwrap().clone() {
            return Err(err);
        }
        if *self.hide_lookups.lock().unwrap() {
            return Ok(None);
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| {
                r.full_name.eq_ignore_ascii_case(&query.name)
                    && r.community.eq_ignore_ascii_case(&query.community)
                    && r.role.eq_ignore_ascii_case(&query.role)
                    && r.recorded_at >= query.day_start
                    && r.recorded_at < query.day_end
            })
            .map(|r| ExistingAttendance {
                uuid: r.uuid.clone(),
                full_name: r.full_name.clone(),
                community: r.community.clone(),
                role: r.role.clone(),
                recorded_at: r.recorded_at,
            }))
    }
}

#[derive(Default)]
pub struct FakeReferences {
    failing: Mutex<HashSet<&'static str>>,
}

#[allow(dead_code)]
impl FakeReferences {
    pub fn fail(&self, set: &'static str) {
        self.failing.lock().unwrap().insert(set);
    }

    fn check(&self, set: &str) -> BackendResult<()> {
        if self.failing.lock().unwrap().contains(set) {
            return Err(BackendError::unknown(format!("{} endpoint returned 500", set)));
        }
        Ok(())
    }
}

pub fn communities() -> Vec<Community> {
    vec![
        Community {
            id: "c-itapevi".into(),
            name: "Itapevi".into(),
        },
        Community {
            id: "c-cotia".into(),
            name: "Cotia".into(),
        },
    ]
}

pub fn roles() -> Vec<Role> {
    vec![
        Role {
            id: "r-musico".into(),
            name: "Músico".into(),
        },
        Role {
            id: "r-organista".into(),
            name: "Organista".into(),
        },
    ]
}

pub fn instruments() -> Vec<Instrument> {
    vec![Instrument {
        id: "i-violino".into(),
        name: "Violino".into(),
    }]
}

pub fn people() -> Vec<Person> {
    vec![
        Person {
            id: "p-ana".into(),
            full_name: "Ana Silva".into(),
            community_id: Some("c-itapevi".into()),
            real_role: None,
        },
        Person {
            id: "p-bruno".into(),
            full_name: "Bruno Costa".into(),
            community_id: Some("c-itapevi".into()),
            real_role: Some("Músico".into()),
        },
        Person {
            id: "p-carla".into(),
            full_name: "Carla Dias".into(),
            community_id: Some("c-cotia".into()),
            real_role: None,
        },
    ]
}

#[async_trait]
impl ReferenceSource for FakeReferences {
    async fn communities(&self) -> BackendResult<Vec<Community>> {
        self.check("communities")?;
        Ok(communities())
    }

    async fn roles(&self) -> BackendResult<Vec<Role>> {
        self.check("roles")?;
        Ok(roles())
    }

    async fn instruments(&self) -> BackendResult<Vec<Instrument>> {
        self.check("instruments")?;
        Ok(instruments())
    }

    async fn people(&self) -> BackendResult<Vec<Person>> {
        self.check("people")?;
        Ok(people())
    }
}

pub struct FakeSession(pub bool);

#[async_trait]
impl SessionProvider for FakeSession {
    async fn has_valid_session(&self) -> bool {
        self.0
    }
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub flag: ConnectivityFlag,
    pub sheet: Arc<FakeSheet>,
    pub relational: Arc<FakeRelational>,
    #[allow(dead_code)]
    pub references: Arc<FakeReferences>,
}

#[allow(dead_code)]
impl Harness {
    pub fn online() -> Self {
        Self::build(true, true, fast_policy())
    }

    pub fn offline() -> Self {
        Self::build(false, true, fast_policy())
    }

    pub fn with_policy(online: bool, policy: SyncPolicy) -> Self {
        Self::build(online, true, policy)
    }

    pub fn without_session() -> Self {
        Self::build(true, false, fast_policy())
    }

    fn build(online: bool, session: bool, policy: SyncPolicy) -> Self {
        let flag = ConnectivityFlag::new(online);
        let sheet = Arc::new(FakeSheet::default());
        let relational = Arc::new(FakeRelational::default());
        let references = Arc::new(FakeReferences::default());
        let parts = EngineParts {
            connectivity: Arc::new(flag.clone()),
            sheet: sheet.clone(),
            relational: relational.clone(),
            references: references.clone(),
            session: Arc::new(FakeSession(session)),
        };
        let engine = SyncEngine::new(
            parts,
            Arc::new(MemorySlotStore::new()),
            LocalCalendar::from_offset_minutes(OFFSET_MINUTES),
            policy,
        );
        seed_catalog(&engine);
        Self {
            engine,
            flag,
            sheet,
            relational,
            references,
        }
    }
}

pub fn seed_catalog(engine: &SyncEngine) {
    let store = engine.catalog_store();
    store.replace_communities(communities()).unwrap();
    store.replace_roles(roles()).unwrap();
    store.replace_instruments(instruments()).unwrap();
    store.replace_people(people()).unwrap();
}
