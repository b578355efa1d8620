//! `LeadStore` trait — the single async interface for lead persistence.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::store::model::{Lead, LeadField, LeadUpdate};

/// Backend-agnostic durable lead store.
///
/// Storage failures are always returned, never swallowed: a dropped write
/// loses the lead's funnel position.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Create the lead if absent, otherwise touch it and coalesce fields.
    ///
    /// A new lead starts at `update.stage` or `Start`. Supplying
    /// `Stage::Start` also stamps `started_at`.
    async fn upsert(&self, update: &LeadUpdate) -> Result<(), DatabaseError>;

    /// Get a lead by user id.
    async fn get(&self, user_id: &str) -> Result<Option<Lead>, DatabaseError>;

    /// Total number of leads.
    async fn count_all(&self) -> Result<u64, DatabaseError>;

    /// Lead counts grouped by `field`, excluding empty values.
    async fn count_by(&self, field: LeadField) -> Result<BTreeMap<String, u64>, DatabaseError>;

    /// Leads that entered `Start` at or after `cutoff`.
    async fn list_started_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Lead>, DatabaseError>;

    /// Insert a complete lead record unless one already exists for its user id.
    /// Returns whether a row was inserted.
    async fn insert_if_absent(&self, lead: &Lead) -> Result<bool, DatabaseError>;
}
