//! Catalog adapters
//!
//! A catalog is the external data source the graph is built from. It hands
//! out already-filtered collaboration records as a produce-once stream and
//! answers point lookups and name searches. Re-invoke a streaming method for
//! a fresh pass; a stream that was dropped half-way cannot be resumed.

use async_trait::async_trait;
use futures::stream::BoxStream;
use sdos_common::{ArtistId, ArtistMatch, ArtistName, CollaborationRecord};

use crate::error::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;

/// Stream of filtered collaboration records
pub type RecordStream<'a> = BoxStream<'a, Result<CollaborationRecord>>;

/// Stream of every known artist with its display information
pub type NameStream<'a> = BoxStream<'a, Result<(ArtistId, ArtistName)>>;

/// Fuzzy (substring) search tier never returns more candidates than this
pub const MAX_FUZZY_CANDIDATES: usize = 50;

/// Data source the collaboration graph and name lookup are built from
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Stream every filtered multi-artist recording, artists in credit order
    fn stream_collaborations(&self) -> RecordStream<'_>;

    /// Stream every artist in the catalog (full scan)
    fn stream_artist_names(&self) -> NameStream<'_>;

    /// Look up a single artist's display information
    async fn lookup_artist(&self, id: ArtistId) -> Result<Option<ArtistName>>;

    /// Search artists by name
    ///
    /// Ranking: exact name matches first, then alias matches, then substring
    /// matches (only when there is no exact or alias hit). Each tier is
    /// ordered by descending release count.
    async fn search_artists(&self, query: &str, limit: usize) -> Result<Vec<ArtistMatch>>;
}
