//! Strategy tracks offered to leads.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A copy-trading track a lead can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    St50,
    St500,
}

/// Presentation details for a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyProfile {
    pub name: &'static str,
    pub audience: &'static str,
    /// Strategy channel on Telegram.
    pub channel_link: &'static str,
    /// Copy-trading deep link.
    pub copy_link: &'static str,
}

const ST50: StrategyProfile = StrategyProfile {
    name: "Steady Trading 50",
    audience: "Accounts under $500",
    channel_link: "https://t.me/steadytradinggold",
    copy_link: "https://vantageapp.onelink.me/qaPD?deep_link_value=DQJC6YGBLQIAA===",
};

const ST500: StrategyProfile = StrategyProfile {
    name: "Steady Trading 500",
    audience: "Accounts over $500",
    channel_link: "https://t.me/steadytradingteam",
    copy_link: "https://vantageapp.onelink.me/qaPD?deep_link_value=DPTCPDWZWAIAA===",
};

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::St50, Strategy::St500];

    pub fn key(&self) -> &'static str {
        match self {
            Self::St50 => "st50",
            Self::St500 => "st500",
        }
    }

    pub fn profile(&self) -> &'static StrategyProfile {
        match self {
            Self::St50 => &ST50,
            Self::St500 => &ST500,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.key() == s)
            .ok_or_else(|| format!("unknown strategy '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_parse_exactly() {
        assert_eq!("st50".parse::<Strategy>().unwrap(), Strategy::St50);
        assert_eq!("st500".parse::<Strategy>().unwrap(), Strategy::St500);
        assert!("st5000".parse::<Strategy>().is_err());
        assert!("ST50".parse::<Strategy>().is_err());
    }

    #[test]
    fn profiles_have_distinct_links() {
        assert_ne!(Strategy::St50.profile().copy_link, Strategy::St500.profile().copy_link);
        assert_ne!(
            Strategy::St50.profile().channel_link,
            Strategy::St500.profile().channel_link
        );
    }

    #[test]
    fn display_matches_serde() {
        for strategy in Strategy::ALL {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(format!("\"{strategy}\""), json);
        }
    }
}
