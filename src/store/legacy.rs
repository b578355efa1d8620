//! Import of the flat `leads.json` file kept by earlier deployments.
//!
//! The file maps chat ids to `{first_seen, stage, last_touch}` records with
//! naive UTC ISO timestamps. Leads already in the store are left alone, so
//! the import can run on every startup.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::{DatabaseError, Error};
use crate::funnel::{Stage, Strategy};
use crate::store::model::{Lead, non_empty};
use crate::store::traits::LeadStore;

#[derive(Debug, Deserialize)]
struct LegacyLead {
    first_seen: Option<String>,
    last_touch: Option<String>,
    stage: Option<String>,
    source: Option<String>,
    name: Option<String>,
    strategy: Option<String>,
}

/// Import leads from `path`. Returns how many were inserted.
///
/// A missing file imports nothing. Records with an unknown stage are skipped
/// with a warning.
pub async fn import_leads_json(store: &dyn LeadStore, path: &Path) -> Result<usize, Error> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No legacy leads file");
        return Ok(0);
    }

    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DatabaseError::Import(format!("{}: {e}", path.display())))?;
    let records: BTreeMap<String, LegacyLead> = serde_json::from_str(&raw).map_err(|e| {
        DatabaseError::Serialization(format!("{}: {e}", path.display()))
    })?;

    let now = Utc::now();
    let mut imported = 0;
    for (user_id, record) in records {
        let stage = match record.stage.as_deref().unwrap_or("start").parse::<Stage>() {
            Ok(stage) => stage,
            Err(e) => {
                tracing::warn!(user_id = %user_id, "Skipping legacy lead: {e}");
                continue;
            }
        };

        let first_seen = record
            .first_seen
            .as_deref()
            .and_then(parse_legacy_timestamp)
            .unwrap_or(now);
        let last_touch = record
            .last_touch
            .as_deref()
            .and_then(parse_legacy_timestamp)
            .unwrap_or(first_seen)
            .max(first_seen);

        let lead = Lead {
            user_id: user_id.clone(),
            first_seen,
            last_touch,
            stage,
            source: non_empty(record.source),
            display_name: non_empty(record.name),
            strategy: record.strategy.and_then(|s| s.parse::<Strategy>().ok()),
            started_at: None,
        };

        if store.insert_if_absent(&lead).await? {
            imported += 1;
        }
    }

    tracing::info!(path = %path.display(), imported, "Legacy leads imported");
    Ok(imported)
}

/// Accepts naive ISO timestamps (assumed UTC) and RFC 3339.
fn parse_legacy_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|ndt| ndt.and_utc())
}
