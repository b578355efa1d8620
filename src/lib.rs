//! Lead Funnel — a chat bot that walks leads through a copy-trading onboarding
//! funnel, tracks their stage, and follows up with timed reminders.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod funnel;
pub mod reminders;
pub mod report;
pub mod router;
pub mod store;
