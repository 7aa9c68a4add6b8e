//! # SDOS Common Library
//!
//! Shared code for the SDOS collaboration pathfinder:
//! - Catalog domain types (artists, collaboration records, search hits)
//! - Bootstrap configuration loading and folder resolution
//! - Catalog database connection helper
//! - Error type and timing helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{ArtistId, ArtistMatch, ArtistName, CollaborationRecord};
