//! Database Layer
//!
//! libsql-backed persistence: connection management, schema bootstrap, and
//! the raw SQL primitives the services build on.

mod database;
mod error;

pub use database::DatabaseService;
pub use error::DatabaseError;
