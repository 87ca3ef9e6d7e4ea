//! Persistent session store for the OrangeLogic API client.
//!
//! Uses `rusqlite` (bundled `SQLite`) so that the API token survives between
//! command invocations.

mod migrations;
mod store;

#[allow(clippy::module_name_repetitions)]
pub use store::SqliteSessionStore;
