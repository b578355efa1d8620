//! Lead record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::funnel::{Stage, Strategy};

/// A tracked end-user and their funnel progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub user_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_touch: DateTime<Utc>,
    pub stage: Stage,
    pub source: Option<String>,
    pub display_name: Option<String>,
    pub strategy: Option<Strategy>,
    /// When the lead last (re)entered `Start`.
    pub started_at: Option<DateTime<Utc>>,
}

/// A partial update for one lead. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadUpdate {
    pub user_id: String,
    pub stage: Option<Stage>,
    pub source: Option<String>,
    pub display_name: Option<String>,
    pub strategy: Option<Strategy>,
}

impl LeadUpdate {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = non_empty(source);
        self
    }

    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = non_empty(name);
        self
    }

    pub fn with_strategy(mut self, strategy: Option<Strategy>) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Fields that reporting can group leads by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadField {
    Stage,
    Source,
    Strategy,
}

impl LeadField {
    /// Column backing this field.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Source => "source",
            Self::Strategy => "strategy",
        }
    }
}

/// Trim a value and drop it if nothing is left.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_drops_empty_values() {
        let update = LeadUpdate::new("1")
            .with_source(Some("   ".into()))
            .with_display_name(Some("".into()));
        assert!(update.source.is_none());
        assert!(update.display_name.is_none());
    }

    #[test]
    fn builder_trims_values() {
        let update = LeadUpdate::new("1").with_display_name(Some("  Alice ".into()));
        assert_eq!(update.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn new_update_is_empty() {
        let update = LeadUpdate::new("7");
        assert_eq!(update.user_id, "7");
        assert!(update.stage.is_none());
        assert!(update.strategy.is_none());
    }
}
