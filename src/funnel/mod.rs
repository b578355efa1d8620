//! Funnel domain — stages, strategies, referral tokens, and the state machine.

pub mod machine;
pub mod messages;
pub mod referral;
pub mod stage;
pub mod strategy;

pub use machine::{Decision, Keyword, MenuOption, Reply, Signal, Subject, decide};
pub use referral::{ORGANIC_SOURCE, Referral, parse_referral};
pub use stage::Stage;
pub use strategy::{Strategy, StrategyProfile};
