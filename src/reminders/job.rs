//! Reminder job value objects.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::channels::OutgoingMessage;
use crate::config::{FunnelLinks, ReminderDelays};
use crate::funnel::Stage;

/// The three follow-up reminders armed on every start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayClass {
    Short,
    Medium,
    Long,
}

impl DelayClass {
    pub const ALL: [DelayClass; 3] = [Self::Short, Self::Medium, Self::Long];

    /// Job-name prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Short => "fu30",
            Self::Medium => "fu24",
            Self::Long => "fu72",
        }
    }

    /// Deterministic job name for a user, e.g. `fu30_12345`.
    pub fn job_name(&self, user_id: &str) -> String {
        format!("{}_{user_id}", self.prefix())
    }

    pub fn delay(&self, delays: &ReminderDelays) -> Duration {
        match self {
            Self::Short => delays.short,
            Self::Medium => delays.medium,
            Self::Long => delays.long,
        }
    }

    /// Whether a lead at `stage` should still receive this reminder.
    pub fn allows(&self, stage: Stage) -> bool {
        let stage = stage.guard_stage();
        match self {
            Self::Short => stage == Stage::Start,
            Self::Medium => matches!(stage, Stage::Start | Stage::Done),
            Self::Long => matches!(stage, Stage::Start | Stage::Done | Stage::Verified),
        }
    }

    pub fn message(&self, links: &FunnelLinks) -> OutgoingMessage {
        match self {
            Self::Short => OutgoingMessage::text(format!(
                "Quick reminder: creating your account is the first step.\n\n👉 {}\n\nType \"Done\" when finished.",
                links.account
            )),
            Self::Medium => OutgoingMessage::text(
                "How is it going? Once verification (KYC) is completed, you are one step from copy trading.\n\
                 Type \"Verified\" when ready.",
            ),
            Self::Long => OutgoingMessage::text(
                "Need a hand? Add funds at your own pace. When you are done, type \"Funded\".\n\
                 If you have questions, tap \"Contact Support\" in the menu.",
            ),
        }
    }
}

/// A pending reminder for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderJob {
    pub name: String,
    pub user_id: String,
    pub class: DelayClass,
    pub fire_at: DateTime<Utc>,
}

impl ReminderJob {
    pub fn new(user_id: &str, class: DelayClass, fire_at: DateTime<Utc>) -> Self {
        Self {
            name: class.job_name(user_id),
            user_id: user_id.to_string(),
            class,
            fire_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_names() {
        assert_eq!(DelayClass::Short.job_name("42"), "fu30_42");
        assert_eq!(DelayClass::Medium.job_name("42"), "fu24_42");
        assert_eq!(DelayClass::Long.job_name("42"), "fu72_42");
    }

    #[test]
    fn guards() {
        use DelayClass::*;

        for stage in [Stage::Start, Stage::StrategySelected, Stage::StartCopying] {
            assert!(Short.allows(stage));
            assert!(Medium.allows(stage));
            assert!(Long.allows(stage));
        }

        assert!(!Short.allows(Stage::Done));
        assert!(Medium.allows(Stage::Done));
        assert!(Long.allows(Stage::Done));

        assert!(!Short.allows(Stage::Verified));
        assert!(!Medium.allows(Stage::Verified));
        assert!(Long.allows(Stage::Verified));

        for stage in [Stage::Funded, Stage::Copied] {
            assert!(!Short.allows(stage));
            assert!(!Medium.allows(stage));
            assert!(!Long.allows(stage));
        }
    }

    #[test]
    fn short_reminder_carries_account_link() {
        let links = FunnelLinks {
            account: "https://example.test/open".into(),
            ..FunnelLinks::default()
        };
        let msg = DelayClass::Short.message(&links);
        assert!(msg.text.contains("https://example.test/open"));
        assert!(msg.text.contains("Done"));
    }

    #[test]
    fn delays_map_to_classes() {
        let delays = ReminderDelays::default();
        assert_eq!(DelayClass::Short.delay(&delays), Duration::from_secs(1800));
        assert_eq!(DelayClass::Medium.delay(&delays), Duration::from_secs(86_400));
        assert_eq!(DelayClass::Long.delay(&delays), Duration::from_secs(259_200));
    }
}
