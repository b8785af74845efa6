//! SQLite persistence for the sitetrack cascade.

mod rows;
pub mod schema;
mod store;

pub use store::SqliteStore;
