//! Funnel stages.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Position of a lead in the funnel.
///
/// Funnel order: Start → StrategySelected → StartCopying → Done → Verified →
/// Funded → Copied. `StrategySelected` and `StartCopying` are optional
/// sub-states of `Start`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Start,
    StrategySelected,
    StartCopying,
    Done,
    Verified,
    Funded,
    Copied,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Start,
        Stage::StrategySelected,
        Stage::StartCopying,
        Stage::Done,
        Stage::Verified,
        Stage::Funded,
        Stage::Copied,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StrategySelected => "strategy_selected",
            Self::StartCopying => "start_copying",
            Self::Done => "done",
            Self::Verified => "verified",
            Self::Funded => "funded",
            Self::Copied => "copied",
        }
    }

    /// Stage used when evaluating reminder guards: the `Start` sub-states
    /// collapse onto `Start`.
    pub fn guard_stage(&self) -> Stage {
        match self {
            Self::StrategySelected | Self::StartCopying => Self::Start,
            other => *other,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}
