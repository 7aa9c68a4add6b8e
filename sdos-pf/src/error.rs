//! Error types for sdos-pf
//!
//! "No path" is not an error: it is reported as a successful
//! [`PathOutcome`](crate::manager::PathOutcome) with `found == false`.
//! Cache corruption never surfaces here either; the cache treats it as a miss.

use sdos_common::ArtistId;
use thiserror::Error;

/// Main error type for the pathfinder
#[derive(Error, Debug)]
pub enum Error {
    /// Graph not loaded yet and the readiness policy is fail-fast
    #[error("Collaboration graph is not ready yet")]
    NotReady,

    /// One or both query endpoints have no collaborations in the graph
    #[error("Artists not present in the collaboration graph: {missing:?}")]
    EntityNotInGraph { missing: Vec<ArtistId> },

    /// Catalog could not be reached or failed mid-stream
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Path search hit its node-expansion budget
    #[error("Path search exhausted after expanding {expanded} artists")]
    SearchExhausted { expanded: usize },

    /// Cache artifact could not be written
    #[error("Cache error: {0}")]
    Cache(String),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// sdos-common error
    #[error("Common error: {0}")]
    Common(#[from] sdos_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::CatalogUnavailable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Background task failed: {}", err))
    }
}

/// Convenience Result type using the pathfinder Error
pub type Result<T> = std::result::Result<T, Error>;
