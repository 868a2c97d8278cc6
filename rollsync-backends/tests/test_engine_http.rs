use chrono::{TimeZone, Utc};
use rollsync::{
    Community, ConnectivityFlag, DuplicateSource, EngineParts, LocalCalendar, MemorySlotStore,
    Outcome, QueueReason, RegistrationRecord, Role, SyncEngine, SyncPolicy, SyncRunStatus,
};
use rollsync_backends::{PostgrestClient, SheetsClient, StaticSession};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Setup {
    engine: Arc<SyncEngine>,
    flag: ConnectivityFlag,
    sheet: MockServer,
    db: MockServer,
}

async fn setup(online: bool) -> Setup {
    let sheet = MockServer::start().await;
    let db = MockServer::start().await;
    let calendar = LocalCalendar::from_offset_minutes(-180);
    let flag = ConnectivityFlag::new(online);
    let client = Arc::new(PostgrestClient::new(db.uri(), "anon-key"));

    let parts = EngineParts {
        connectivity: Arc::new(flag.clone()),
        sheet: Arc::new(SheetsClient::new(sheet.uri(), calendar)),
        relational: client.clone(),
        references: client,
        session: Arc::new(StaticSession::new(Some("jwt".into()))),
    };
    let policy = SyncPolicy {
        drain_cooldown: Duration::ZERO,
        connectivity_probes: 1,
        item_delay: Duration::from_millis(1),
        ..SyncPolicy::default()
    };
    let engine = SyncEngine::new(parts, Arc::new(MemorySlotStore::new()), calendar, policy);

    let catalog = engine.catalog_store();
    catalog
        .replace_communities(vec![Community {
            id: "c1".into(),
            name: "Itapevi".into(),
        }])
        .unwrap();
    catalog
        .replace_roles(vec![Role {
            id: "r1".into(),
            name: "Organista".into(),
        }])
        .unwrap();

    Setup {
        engine,
        flag,
        sheet,
        db,
    }
}

fn record() -> RegistrationRecord {
    RegistrationRecord::manual("Ana Silva", "c1", "r1", Utc.with_ymd_and_hms(2025, 3, 10, 13, 5, 0).unwrap())
        .with_location("Itapevi")
}

async fn mount_empty_lookup(db: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/presencas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(db)
        .await;
}

#[tokio::test]
async fn test_registration_reaches_both_services() {
    let s = setup(true).await;
    mount_empty_lookup(&s.db).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&s.sheet)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/presencas"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&s.db)
        .await;

    assert_eq!(s.engine.create_registration(record()).await, Outcome::Delivered);
    assert_eq!(s.engine.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn test_remote_match_blocks_registration() {
    let s = setup(true).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/presencas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "uuid": "9d1f0c1a-1b2c-4d3e-8f4a-5b6c7d8e9f00",
            "nome_completo": "ANA SILVA",
            "comum": "ITAPEVI",
            "cargo": "ORGANISTA",
            "data_ensaio": "2025-03-10T12:30:00Z",
            "created_at": null
        }])))
        .mount(&s.db)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&s.sheet)
        .await;

    let outcome = s.engine.create_registration(record()).await;

    assert_eq!(
        outcome.user_message(),
        "DUPLICATE:Ana Silva|Itapevi|10/03/2025|09:30"
    );
}

#[tokio::test]
async fn test_unique_violation_is_reported_as_duplicate() {
    let s = setup(true).await;
    mount_empty_lookup(&s.db).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&s.sheet)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/presencas"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&s.db)
        .await;

    let Outcome::RejectedDuplicate(info) = s.engine.create_registration(record()).await else {
        panic!("expected duplicate");
    };
    assert_eq!(info.source, DuplicateSource::Constraint);
}

#[tokio::test]
async fn test_offline_record_syncs_after_reconnect() {
    let s = setup(false).await;
    assert_eq!(
        s.engine.create_registration(record()).await,
        Outcome::Queued(QueueReason::Offline)
    );

    mount_empty_lookup(&s.db).await;
    for table in ["comuns", "cargos", "instrumentos"] {
        Mock::given(method("GET"))
            .and(path(format!("/rest/v1/{}", table)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "c1", "nome": "Itapevi"},
                {"id": "r1", "nome": "Organista"}
            ])))
            .mount(&s.db)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/rest/v1/pessoas"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&s.db)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&s.sheet)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/presencas"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&s.db)
        .await;

    s.flag.set(true);
    let summary = s.engine.sync_all().await;

    assert_eq!(summary.status, SyncRunStatus::Completed);
    assert_eq!(summary.references.failed, vec!["people"]);
    assert_eq!(summary.drain.unwrap().succeeded, 1);
    assert_eq!(s.engine.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn test_foreign_key_conflict_does_not_block_user() {
    let s = setup(true).await;
    mount_empty_lookup(&s.db).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&s.sheet)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/presencas"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "code": "23503",
            "message": "insert or update on table \"presencas\" violates foreign key constraint"
        })))
        .mount(&s.db)
        .await;

    let outcome = s.engine.create_registration(record()).await;

    assert!(!outcome.is_blocking());
    assert_eq!(outcome, Outcome::Delivered);
}
