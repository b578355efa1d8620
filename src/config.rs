//! Configuration types, read from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Step 1 link (broker account creation).
pub const DEFAULT_ACCOUNT_LINK: &str = "https://www.vantagemarkets.com/open-live-account/";
/// Default support chat link.
pub const DEFAULT_SUPPORT_LINK: &str = "https://t.me/steadysupport";
/// Default public information channel.
pub const DEFAULT_CHANNEL_LINK: &str = "https://t.me/steadytradingteam";

/// Which messaging channel the bot serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Telegram,
    Cli,
}

/// Delays for the three reminder classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderDelays {
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
}

impl Default for ReminderDelays {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(30 * 60),
            medium: Duration::from_secs(24 * 60 * 60),
            long: Duration::from_secs(72 * 60 * 60),
        }
    }
}

/// Links shown in funnel messages that are not tied to a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelLinks {
    pub account: String,
    pub support: String,
    pub channel: String,
}

impl Default for FunnelLinks {
    fn default() -> Self {
        Self {
            account: DEFAULT_ACCOUNT_LINK.to_string(),
            support: DEFAULT_SUPPORT_LINK.to_string(),
            channel: DEFAULT_CHANNEL_LINK.to_string(),
        }
    }
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub channel: ChannelKind,
    /// Telegram Bot API token. Required when `channel` is Telegram.
    pub telegram_token: Option<SecretString>,
    /// Identity allowed to run `/stats`.
    pub operator_id: String,
    pub db_path: PathBuf,
    /// Optional flat-file lead dump to import on startup.
    pub legacy_leads_json: Option<PathBuf>,
    pub reminders: ReminderDelays,
    pub links: FunnelLinks,
    /// Directory for rolling log files. Stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let channel = match get("FUNNEL_CHANNEL").as_deref() {
            None | Some("telegram") => ChannelKind::Telegram,
            Some("cli") => ChannelKind::Cli,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "FUNNEL_CHANNEL".into(),
                    message: format!("expected 'telegram' or 'cli', got '{other}'"),
                });
            }
        };

        let telegram_token = get("TELEGRAM_BOT_TOKEN").map(SecretString::from);
        if channel == ChannelKind::Telegram && telegram_token.is_none() {
            return Err(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()));
        }

        let operator_id = get("FUNNEL_OPERATOR_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("FUNNEL_OPERATOR_ID".into()))?;

        let defaults = ReminderDelays::default();
        let reminders = ReminderDelays {
            short: parse_secs(&get, "FUNNEL_REMINDER_SHORT_SECS", defaults.short)?,
            medium: parse_secs(&get, "FUNNEL_REMINDER_MEDIUM_SECS", defaults.medium)?,
            long: parse_secs(&get, "FUNNEL_REMINDER_LONG_SECS", defaults.long)?,
        };

        let links = FunnelLinks {
            account: get("FUNNEL_ACCOUNT_LINK").unwrap_or_else(|| DEFAULT_ACCOUNT_LINK.into()),
            support: get("FUNNEL_SUPPORT_LINK").unwrap_or_else(|| DEFAULT_SUPPORT_LINK.into()),
            channel: get("FUNNEL_CHANNEL_LINK").unwrap_or_else(|| DEFAULT_CHANNEL_LINK.into()),
        };

        Ok(Self {
            channel,
            telegram_token,
            operator_id,
            db_path: get("FUNNEL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/leads.db")),
            legacy_leads_json: get("FUNNEL_LEGACY_LEADS_JSON").map(PathBuf::from),
            reminders,
            links,
            log_dir: get("FUNNEL_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_secs<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}' is not a number of seconds: {e}"),
            }),
    }
}
