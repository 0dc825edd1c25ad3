//! SQLite persistence for sessions, the registration cache and feed status

mod models;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::errors::TailRecorderError;
use crate::gateway::{
    PersistenceGateway, RecentSession, RegistryStats, TopEntry, TopTypeEntry, TopWindow,
};
use crate::lookup::LookupOutcome;
use crate::models::{Hex, VisitSession};
use crate::resolver::RegistrationCacheEntry;
use models::{
    from_millis, to_millis, RecentSessionRow, RegistryRow, SessionRow, TopRow, TopTypeRow,
};

/// Database handle; clones share the pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, TailRecorderError> {
        config.validate()?;
        info!("Opening database at {}", config.path.display());

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::new(pool).await
    }

    /// Wrap an existing pool, running migrations on it
    pub async fn new(pool: SqlitePool) -> Result<Self, TailRecorderError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert_session(&self, session: &VisitSession, closed: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sessions (
                hex, session_start, session_end, sighting_count,
                lat, lon, best_rssi, callsign, closed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (hex, session_start) DO UPDATE SET
                session_end = excluded.session_end,
                sighting_count = excluded.sighting_count,
                lat = excluded.lat,
                lon = excluded.lon,
                best_rssi = excluded.best_rssi,
                callsign = excluded.callsign,
                closed = MAX(sessions.closed, excluded.closed)",
        )
        .bind(session.hex.as_str())
        .bind(to_millis(session.session_start))
        .bind(to_millis(session.session_end))
        .bind(session.sighting_count as i64)
        .bind(session.position.map(|p| p.lat))
        .bind(session.position.map(|p| p.lon))
        .bind(session.best_rssi)
        .bind(session.callsign.as_deref())
        .bind(closed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Leaderboard relative to an explicit `now`
    pub async fn top_by_window_at(
        &self,
        window: TopWindow,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<TopEntry>, sqlx::Error> {
        let since = window.since(now).map_or(i64::MIN, to_millis);
        let rows: Vec<TopRow> = sqlx::query_as(
            "SELECT ar.registration AS registration, COUNT(*) AS visits
            FROM sessions s
            JOIN aircraft_registry ar ON s.hex = ar.hex
            WHERE ar.registration IS NOT NULL AND s.session_start >= ?1
            GROUP BY ar.registration
            ORDER BY visits DESC, ar.registration ASC
            LIMIT ?2",
        )
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| row.ranked(i + 1))
            .collect())
    }

    /// Type leaderboard relative to an explicit `now`
    pub async fn top_types_by_window_at(
        &self,
        window: TopWindow,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<TopTypeEntry>, sqlx::Error> {
        let since = window.since(now).map_or(i64::MIN, to_millis);
        let rows: Vec<TopTypeRow> = sqlx::query_as(
            "SELECT ar.normalized_type AS aircraft_type, COUNT(*) AS visits
            FROM sessions s
            JOIN aircraft_registry ar ON s.hex = ar.hex
            WHERE ar.normalized_type IS NOT NULL AND s.session_start >= ?1
            GROUP BY ar.normalized_type
            ORDER BY visits DESC, ar.normalized_type ASC
            LIMIT ?2",
        )
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| row.ranked(i + 1))
            .collect())
    }

    /// When the feed last produced a snapshot
    pub async fn last_snapshot_timestamp(&self) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        let ms: Option<Option<i64>> =
            sqlx::query_scalar("SELECT last_snapshot_at FROM feed_status WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        ms.flatten()
            .map(from_millis)
            .transpose()
            .map_err(decode_error)
    }
}

fn decode_error(e: TailRecorderError) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

/// Convert rows, skipping (and logging) the ones that no longer parse
fn convert_rows<R, T>(rows: Vec<R>) -> Vec<T>
where
    T: TryFrom<R, Error = TailRecorderError>,
{
    rows.into_iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping stored row: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl PersistenceGateway for Database {
    async fn record_session_close(&self, session: &VisitSession) -> Result<(), sqlx::Error> {
        self.upsert_session(session, true).await
    }

    async fn upsert_open_session(&self, session: &VisitSession) -> Result<(), sqlx::Error> {
        self.upsert_session(session, false).await
    }

    async fn upsert_live_snapshot_timestamp(&self, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO feed_status (id, last_snapshot_at) VALUES (1, ?1)
            ON CONFLICT (id) DO UPDATE SET last_snapshot_at = excluded.last_snapshot_at",
        )
        .bind(to_millis(at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_registration(
        &self,
        hex: &Hex,
        outcome: &LookupOutcome,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let details = match outcome {
            LookupOutcome::Found(details) => Some(details),
            LookupOutcome::NotFound => None,
        };
        sqlx::query(
            "INSERT OR REPLACE INTO aircraft_registry (
                hex, registration, aircraft_type, manufacturer, icao_type,
                normalized_type, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(hex.as_str())
        .bind(details.map(|d| d.registration.as_str()))
        .bind(details.and_then(|d| d.aircraft_type.as_deref()))
        .bind(details.and_then(|d| d.manufacturer.as_deref()))
        .bind(details.and_then(|d| d.icao_type.as_deref()))
        .bind(details.and_then(|d| d.normalized_type()))
        .bind(to_millis(resolved_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_seeded_registration(
        &self,
        hex: &Hex,
        registration: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO aircraft_registry (hex, registration, resolved_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (hex) DO UPDATE SET
                registration = excluded.registration,
                resolved_at = excluded.resolved_at",
        )
        .bind(hex.as_str())
        .bind(registration)
        .bind(to_millis(resolved_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_recent_sessions(&self, limit: u32) -> Result<Vec<RecentSession>, sqlx::Error> {
        let rows: Vec<RecentSessionRow> = sqlx::query_as(
            "SELECT s.hex, COALESCE(ar.registration, s.callsign) AS tail,
                s.session_start, s.session_end, s.sighting_count,
                s.lat, s.lon, s.best_rssi, s.closed
            FROM sessions s
            LEFT JOIN aircraft_registry ar ON s.hex = ar.hex
            ORDER BY s.session_start DESC
            LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(convert_rows(rows))
    }

    async fn get_top_by_window(
        &self,
        window: TopWindow,
        limit: u32,
    ) -> Result<Vec<TopEntry>, sqlx::Error> {
        self.top_by_window_at(window, limit, Utc::now()).await
    }

    async fn get_top_types_by_window(
        &self,
        window: TopWindow,
        limit: u32,
    ) -> Result<Vec<TopTypeEntry>, sqlx::Error> {
        self.top_types_by_window_at(window, limit, Utc::now()).await
    }

    async fn get_registration_cache_stats(&self) -> Result<RegistryStats, sqlx::Error> {
        let (known, total): (i64, i64) =
            sqlx::query_as("SELECT COUNT(registration), COUNT(*) FROM aircraft_registry")
                .fetch_one(&self.pool)
                .await?;
        Ok(RegistryStats {
            known,
            not_found: total - known,
        })
    }

    async fn load_registrations(&self) -> Result<Vec<RegistrationCacheEntry>, sqlx::Error> {
        let rows: Vec<RegistryRow> =
            sqlx::query_as("SELECT hex, registration, resolved_at FROM aircraft_registry")
                .fetch_all(&self.pool)
                .await?;
        Ok(convert_rows(rows))
    }

    async fn load_open_sessions(&self) -> Result<Vec<VisitSession>, sqlx::Error> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT hex, session_start, session_end, sighting_count,
                lat, lon, best_rssi, callsign
            FROM sessions WHERE closed = 0",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(convert_rows(rows))
    }
}
