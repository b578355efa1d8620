//! libSQL backend — async `LeadStore` implementation.
//!
//! Supports local file and in-memory databases. Every upsert is a single
//! `INSERT … ON CONFLICT DO UPDATE` statement, so concurrent writes to the
//! same lead cannot interleave inside a read-modify-write.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::funnel::{Stage, Strategy};
use crate::store::migrations;
use crate::store::model::{Lead, LeadField, LeadUpdate};
use crate::store::traits::LeadStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ndt.and_utc());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(ndt.and_utc());
    }
    Err(DatabaseError::Serialization(format!("invalid timestamp '{s}'")))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Read a nullable text column.
fn opt_text_col(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    match row
        .get_value(idx)
        .map_err(|e| DatabaseError::Query(format!("column {idx}: {e}")))?
    {
        libsql::Value::Text(s) if !s.is_empty() => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn text_col(row: &libsql::Row, idx: i32) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Query(format!("column {idx}: {e}")))
}

/// Map a libsql Row to a Lead.
///
/// Column order matches LEAD_COLUMNS:
/// 0:user_id, 1:first_seen, 2:last_touch, 3:stage, 4:source, 5:display_name,
/// 6:strategy, 7:started_at
fn row_to_lead(row: &libsql::Row) -> Result<Lead, DatabaseError> {
    let stage_str = text_col(row, 3)?;
    let stage: Stage = stage_str.parse().map_err(DatabaseError::Serialization)?;

    let strategy = opt_text_col(row, 6)?
        .map(|s| s.parse::<Strategy>())
        .transpose()
        .map_err(DatabaseError::Serialization)?;

    let started_at = opt_text_col(row, 7)?
        .map(|s| parse_datetime(&s))
        .transpose()?;

    Ok(Lead {
        user_id: text_col(row, 0)?,
        first_seen: parse_datetime(&text_col(row, 1)?)?,
        last_touch: parse_datetime(&text_col(row, 2)?)?,
        stage,
        source: opt_text_col(row, 4)?,
        display_name: opt_text_col(row, 5)?,
        strategy,
        started_at,
    })
}

// ── Trait implementation ────────────────────────────────────────────

const LEAD_COLUMNS: &str =
    "user_id, first_seen, last_touch, stage, source, display_name, strategy, started_at";

#[async_trait]
impl LeadStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn upsert(&self, update: &LeadUpdate) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = format_datetime(Utc::now());
        let stage = update.stage.map(|s| s.as_str());
        let strategy = update.strategy.map(|s| s.key());

        // ?2 is both timestamps on insert; MAX keeps last_touch >= first_seen.
        conn.execute(
            "INSERT INTO leads (user_id, first_seen, last_touch, stage, source, display_name, strategy, started_at)
             VALUES (?1, ?2, ?2, COALESCE(?3, 'start'), NULLIF(?4, ''), NULLIF(?5, ''), ?6,
                     CASE WHEN ?3 = 'start' THEN ?2 ELSE NULL END)
             ON CONFLICT (user_id) DO UPDATE SET
                last_touch = MAX(excluded.last_touch, leads.first_seen),
                stage = COALESCE(?3, leads.stage),
                source = COALESCE(NULLIF(?4, ''), leads.source),
                display_name = COALESCE(NULLIF(?5, ''), leads.display_name),
                strategy = COALESCE(?6, leads.strategy),
                started_at = CASE WHEN ?3 = 'start' THEN excluded.last_touch ELSE leads.started_at END",
            params![
                update.user_id.as_str(),
                now,
                opt_text(stage),
                opt_text(update.source.as_deref()),
                opt_text(update.display_name.as_deref()),
                opt_text(strategy),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert lead: {e}")))?;

        debug!(user_id = %update.user_id, stage = ?update.stage, "Lead upserted");
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<Lead>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get lead: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_lead(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get lead: {e}"))),
        }
    }

    async fn count_all(&self) -> Result<u64, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query("SELECT COUNT(*) FROM leads", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count leads: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count leads: {e}")))?;
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count leads: {e}"))),
        }
    }

    async fn count_by(&self, field: LeadField) -> Result<BTreeMap<String, u64>, DatabaseError> {
        let conn = self.conn();
        let col = field.column();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {col}, COUNT(*) FROM leads
                     WHERE {col} IS NOT NULL AND {col} <> ''
                     GROUP BY {col}"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count leads by {col}: {e}")))?;

        let mut counts = BTreeMap::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => {
                    let label = text_col(&row, 0)?;
                    let count: i64 = row
                        .get(1)
                        .map_err(|e| DatabaseError::Query(format!("count leads by {col}: {e}")))?;
                    counts.insert(label, count.max(0) as u64);
                }
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("count leads by {col}: {e}"))),
            }
        }
        Ok(counts)
    }

    async fn list_started_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Lead>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads
                     WHERE started_at IS NOT NULL AND started_at >= ?1
                     ORDER BY started_at"
                ),
                params![format_datetime(cutoff)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list started leads: {e}")))?;

        let mut leads = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => leads.push(row_to_lead(&row)?),
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("list started leads: {e}"))),
            }
        }
        Ok(leads)
    }

    async fn insert_if_absent(&self, lead: &Lead) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let inserted = conn
            .execute(
                "INSERT INTO leads (user_id, first_seen, last_touch, stage, source, display_name, strategy, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (user_id) DO NOTHING",
                params![
                    lead.user_id.as_str(),
                    format_datetime(lead.first_seen),
                    format_datetime(lead.last_touch.max(lead.first_seen)),
                    lead.stage.as_str(),
                    opt_text(lead.source.as_deref()),
                    opt_text(lead.display_name.as_deref()),
                    opt_text(lead.strategy.map(|s| s.key())),
                    opt_text(lead.started_at.map(format_datetime).as_deref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert lead: {e}")))?;
        Ok(inserted > 0)
    }
}
