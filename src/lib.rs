//! ProTrack core: filtered task queries, contribution rollups, and
//! streaming spreadsheet export over a Postgres store.
//!
//! The HTTP layer is a thin external collaborator: it hands this crate
//! a raw query-parameter map and relays JSON values or the exported
//! byte stream unchanged.

pub mod config;
pub mod contributions;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod models;

pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
