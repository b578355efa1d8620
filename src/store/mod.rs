//! Persistence layer — durable lead records on libSQL.

pub mod legacy;
pub mod libsql_backend;
pub mod migrations;
pub mod model;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use model::{Lead, LeadField, LeadUpdate};
pub use traits::LeadStore;
