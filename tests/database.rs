use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use tail_recorder::{
    config::DatabaseConfig,
    database::Database,
    gateway::{PersistenceGateway, TopWindow},
    lookup::LookupOutcome,
    models::{AircraftDetails, Hex, Position, VisitSession},
    resolver::LookupState,
};

async fn setup_test_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("data").join("tail-recorder.sqlite"),
    };
    let db = Database::connect(&config)
        .await
        .expect("Failed to open database");
    (db, dir)
}

fn hex(s: &str) -> Hex {
    Hex::try_from(s).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn session(h: &str, start: i64, end: i64) -> VisitSession {
    VisitSession {
        hex: hex(h),
        session_start: at(start),
        session_end: at(end),
        sighting_count: 3,
        position: Some(Position {
            lat: 60.317,
            lon: 24.963,
        }),
        best_rssi: Some(-12.5),
        callsign: Some("FIN7AB".to_string()),
    }
}

fn found(registration: &str) -> LookupOutcome {
    LookupOutcome::Found(AircraftDetails {
        registration: registration.to_string(),
        aircraft_type: Some("A320".to_string()),
        manufacturer: Some("Airbus".to_string()),
        icao_type: Some("A320".to_string()),
    })
}

#[tokio::test]
async fn test_open_session_checkpoint_and_close() {
    let (db, _dir) = setup_test_db().await;

    db.upsert_open_session(&session("ABC123", 0, 60)).await.unwrap();
    db.upsert_open_session(&session("ABC123", 0, 120)).await.unwrap();

    let open = db.load_open_sessions().await.unwrap();
    assert_eq!(open, vec![session("ABC123", 0, 120)]);

    db.record_session_close(&session("ABC123", 0, 180)).await.unwrap();
    assert!(db.load_open_sessions().await.unwrap().is_empty());

    let recent = db.get_recent_sessions(10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert!(recent[0].closed);
    assert_eq!(recent[0].session_end, at(180));
    assert_eq!(recent[0].sighting_count, 3);
    assert_eq!(recent[0].best_rssi, Some(-12.5));
}

#[tokio::test]
async fn test_late_checkpoint_does_not_reopen() {
    let (db, _dir) = setup_test_db().await;

    db.record_session_close(&session("ABC123", 0, 180)).await.unwrap();
    db.upsert_open_session(&session("ABC123", 0, 180)).await.unwrap();

    assert!(db.load_open_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recent_sessions_prefer_registration_over_callsign() {
    let (db, _dir) = setup_test_db().await;

    db.record_session_close(&session("ABC123", 0, 60)).await.unwrap();
    db.record_session_close(&session("DEF456", 100, 160)).await.unwrap();
    db.store_registration(&hex("ABC123"), &found("OH-LXA"), at(10))
        .await
        .unwrap();

    let recent = db.get_recent_sessions(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].hex, hex("DEF456"));
    assert_eq!(recent[0].tail.as_deref(), Some("FIN7AB"));
    assert_eq!(recent[1].hex, hex("ABC123"));
    assert_eq!(recent[1].tail.as_deref(), Some("OH-LXA"));

    let limited = db.get_recent_sessions(1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].hex, hex("DEF456"));
}

#[tokio::test]
async fn test_top_by_window() {
    let (db, _dir) = setup_test_db().await;
    let day = 86_400;

    db.store_registration(&hex("ABC123"), &found("OH-LXA"), at(0))
        .await
        .unwrap();
    db.store_registration(&hex("DEF456"), &found("OH-LXB"), at(0))
        .await
        .unwrap();
    db.store_registration(&hex("AAAAAA"), &LookupOutcome::NotFound, at(0))
        .await
        .unwrap();

    // OH-LXA: one visit 40 days ago, one 2 days ago
    db.record_session_close(&session("ABC123", 0, 60)).await.unwrap();
    db.record_session_close(&session("ABC123", 38 * day, 38 * day + 60))
        .await
        .unwrap();
    // OH-LXB: two visits within the last day
    db.record_session_close(&session("DEF456", 40 * day - 7200, 40 * day - 7100))
        .await
        .unwrap();
    db.record_session_close(&session("DEF456", 40 * day - 3600, 40 * day - 3500))
        .await
        .unwrap();
    // Unknown registration never ranks
    db.record_session_close(&session("AAAAAA", 40 * day - 600, 40 * day - 500))
        .await
        .unwrap();

    let now = at(40 * day);

    let day_top = db
        .top_by_window_at(TopWindow::Last24Hours, 10, now)
        .await
        .unwrap();
    assert_eq!(day_top.len(), 1);
    assert_eq!(day_top[0].registration, "OH-LXB");
    assert_eq!(day_top[0].visits, 2);
    assert_eq!(day_top[0].rank, 1);

    let month_top = db
        .top_by_window_at(TopWindow::Last30Days, 10, now)
        .await
        .unwrap();
    assert_eq!(month_top.len(), 2);
    assert_eq!(month_top[0].registration, "OH-LXB");
    assert_eq!(month_top[1].registration, "OH-LXA");
    assert_eq!(month_top[1].visits, 1);
    assert_eq!(month_top[1].rank, 2);

    let all_time = db
        .top_by_window_at(TopWindow::AllTime, 10, now)
        .await
        .unwrap();
    assert_eq!(all_time.len(), 2);
    // Ties are broken by registration
    assert_eq!(all_time[0].registration, "OH-LXA");
    assert_eq!(all_time[0].visits, 2);
    assert_eq!(all_time[1].registration, "OH-LXB");

    let limited = db
        .top_by_window_at(TopWindow::AllTime, 1, now)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_registration_cache_round_trip() {
    let (db, _dir) = setup_test_db().await;

    db.store_registration(&hex("ABC123"), &found("OH-LXA"), at(0))
        .await
        .unwrap();
    db.store_registration(&hex("DEF456"), &LookupOutcome::NotFound, at(5))
        .await
        .unwrap();
    // A later answer replaces the earlier one
    db.store_registration(&hex("DEF456"), &found("OH-LXB"), at(50))
        .await
        .unwrap();
    db.store_registration(&hex("AAAAAA"), &LookupOutcome::NotFound, at(60))
        .await
        .unwrap();

    let stats = db.get_registration_cache_stats().await.unwrap();
    assert_eq!(stats.known, 2);
    assert_eq!(stats.not_found, 1);

    let mut entries = db.load_registrations().await.unwrap();
    entries.sort_by(|a, b| a.hex.cmp(&b.hex));
    assert_eq!(entries.len(), 3);

    assert_eq!(entries[0].hex, hex("AAAAAA"));
    assert_eq!(entries[0].state, LookupState::NotFound);
    assert_eq!(entries[0].registration, None);

    assert_eq!(entries[2].hex, hex("DEF456"));
    assert_eq!(entries[2].state, LookupState::Resolved);
    assert_eq!(entries[2].registration.as_deref(), Some("OH-LXB"));
    assert_eq!(entries[2].resolved_at, Some(at(50)));
}

fn typed(registration: &str, manufacturer: &str, aircraft_type: &str) -> LookupOutcome {
    LookupOutcome::Found(AircraftDetails {
        registration: registration.to_string(),
        aircraft_type: Some(aircraft_type.to_string()),
        manufacturer: Some(manufacturer.to_string()),
        icao_type: None,
    })
}

#[tokio::test]
async fn test_seeded_registration_keeps_lookup_details() {
    let (db, _dir) = setup_test_db().await;

    // Broadcast before any lookup: stored as known
    db.store_seeded_registration(&hex("ABC123"), "OH-LXA", at(0))
        .await
        .unwrap();
    // Broadcast after a lookup: the looked-up type survives
    db.store_registration(&hex("DEF456"), &typed("OH-LXB", "AIRBUS", "A320-214"), at(0))
        .await
        .unwrap();
    db.store_seeded_registration(&hex("DEF456"), "OH-LXC", at(30))
        .await
        .unwrap();
    // A hex the lookup service did not know becomes known
    db.store_registration(&hex("AAAAAA"), &LookupOutcome::NotFound, at(0))
        .await
        .unwrap();
    db.store_seeded_registration(&hex("AAAAAA"), "N512TL", at(40))
        .await
        .unwrap();

    let stats = db.get_registration_cache_stats().await.unwrap();
    assert_eq!(stats.known, 3);
    assert_eq!(stats.not_found, 0);

    let mut entries = db.load_registrations().await.unwrap();
    entries.sort_by(|a, b| a.hex.cmp(&b.hex));
    assert_eq!(entries[0].registration.as_deref(), Some("N512TL"));
    assert_eq!(entries[0].state, LookupState::Resolved);
    assert_eq!(entries[1].registration.as_deref(), Some("OH-LXA"));
    assert_eq!(entries[2].registration.as_deref(), Some("OH-LXC"));
    assert_eq!(entries[2].resolved_at, Some(at(30)));

    let (kept,): (Option<String>,) =
        sqlx::query_as("SELECT normalized_type FROM aircraft_registry WHERE hex = 'DEF456'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(kept.as_deref(), Some("Airbus A320"));
}

#[tokio::test]
async fn test_top_types_by_window() {
    let (db, _dir) = setup_test_db().await;
    let day = 86_400;

    db.store_registration(&hex("ABC123"), &typed("OH-LXA", "AIRBUS", "A320-214"), at(0))
        .await
        .unwrap();
    db.store_registration(&hex("DEF456"), &typed("OH-LXB", "Airbus Industrie", "A320 232"), at(0))
        .await
        .unwrap();
    db.store_registration(&hex("A1B2C3"), &typed("N512TL", "THE BOEING COMPANY", "737-8AS"), at(0))
        .await
        .unwrap();
    // Known registration without any type data never ranks
    db.store_seeded_registration(&hex("AAAAAA"), "G-EZAA", at(0))
        .await
        .unwrap();

    db.record_session_close(&session("ABC123", 0, 60)).await.unwrap();
    db.record_session_close(&session("DEF456", 40 * day - 600, 40 * day - 500))
        .await
        .unwrap();
    db.record_session_close(&session("A1B2C3", 40 * day - 7200, 40 * day - 7100))
        .await
        .unwrap();
    db.record_session_close(&session("A1B2C3", 40 * day - 3600, 40 * day - 3500))
        .await
        .unwrap();
    db.record_session_close(&session("AAAAAA", 40 * day - 60, 40 * day - 30))
        .await
        .unwrap();

    let now = at(40 * day);

    let day_top = db
        .top_types_by_window_at(TopWindow::Last24Hours, 10, now)
        .await
        .unwrap();
    assert_eq!(day_top.len(), 2);
    assert_eq!(day_top[0].aircraft_type, "Boeing 737-800");
    assert_eq!(day_top[0].visits, 2);
    assert_eq!(day_top[0].rank, 1);
    assert_eq!(day_top[1].aircraft_type, "Airbus A320");
    assert_eq!(day_top[1].visits, 1);

    // Both A320 variants fold into one row
    let all_time = db
        .top_types_by_window_at(TopWindow::AllTime, 10, now)
        .await
        .unwrap();
    assert_eq!(all_time.len(), 2);
    assert_eq!(all_time[0].aircraft_type, "Airbus A320");
    assert_eq!(all_time[0].visits, 2);
    assert_eq!(all_time[1].aircraft_type, "Boeing 737-800");
    assert_eq!(all_time[1].visits, 2);

    let limited = db
        .top_types_by_window_at(TopWindow::AllTime, 1, now)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_snapshot_timestamp() {
    let (db, _dir) = setup_test_db().await;

    assert_eq!(db.last_snapshot_timestamp().await.unwrap(), None);
    db.upsert_live_snapshot_timestamp(at(0)).await.unwrap();
    db.upsert_live_snapshot_timestamp(at(10)).await.unwrap();
    assert_eq!(db.last_snapshot_timestamp().await.unwrap(), Some(at(10)));
}

#[tokio::test]
async fn test_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("tail-recorder.sqlite"),
    };

    let db = Database::connect(&config).await.unwrap();
    db.upsert_open_session(&session("ABC123", 0, 60)).await.unwrap();
    db.pool().close().await;

    let db = Database::connect(&config).await.unwrap();
    assert_eq!(db.load_open_sessions().await.unwrap().len(), 1);
}
