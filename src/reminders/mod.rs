//! Follow-up reminders armed when a lead (re)enters the funnel.

pub mod job;
pub mod scheduler;

pub use job::{DelayClass, ReminderJob};
pub use scheduler::ReminderScheduler;
