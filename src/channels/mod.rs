//! Channel abstraction for message I/O.

pub mod channel;
pub mod cli;
pub mod delivery;
pub mod telegram;

pub use channel::*;
pub use cli::CliChannel;
pub use delivery::DeliveryOutcome;
pub use telegram::TelegramChannel;
