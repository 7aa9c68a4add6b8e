//! On-disk cache for the collaboration graph and the artist name lookup
//!
//! Each artifact is a single file holding a bincode-encoded [`CacheMetadata`]
//! header followed by the payload. An artifact is only trusted when it decodes
//! cleanly, was written by the same cache format version and is younger than
//! the configured maximum age; anything else counts as a miss and triggers a
//! rebuild from the catalog.
//!
//! Writes go to a temporary sibling which is synced and then renamed over the
//! target, so a reader sees either the old artifact or the new one.

use bincode::Options;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::graph::{self, CollaborationGraph, NameLookup};
use sdos_common::time::{age_of, format_seconds, now};

/// Bump whenever the encoding of a payload changes
pub const CACHE_FORMAT_VERSION: u32 = 1;

pub const GRAPH_CACHE_FILE: &str = "collaboration_graph.bin";
pub const ARTIST_CACHE_FILE: &str = "artist_lookup.bin";

/// Upper bound on the encoded size of one header or payload
const MAX_ARTIFACT_BYTES: u64 = 16 * 1024 * 1024 * 1024;

/// Encoding shared by reads and writes
///
/// Reads pass the artifact's file size as `limit`: a length prefix claiming
/// more bytes than the file holds fails to decode before anything is allocated.
fn codec(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(limit)
}

/// Header stored in front of every cache artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub format_version: u32,
    /// Version of the binary that wrote the artifact
    pub builder_version: String,
    pub built_at: DateTime<Utc>,
    pub artist_count: usize,
    pub edge_count: usize,
}

impl CacheMetadata {
    pub fn new(artist_count: usize, edge_count: usize) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            builder_version: env!("CARGO_PKG_VERSION").to_string(),
            built_at: now(),
            artist_count,
            edge_count,
        }
    }

    fn for_graph(graph: &CollaborationGraph) -> Self {
        Self::new(graph.len(), graph.edge_count())
    }
}

/// Why a cache artifact could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMiss {
    /// No artifact on disk
    Absent,
    /// Artifact unreadable or failed to decode or validate
    Corrupt,
    /// Artifact written by an incompatible cache format
    FormatMismatch,
    /// Artifact older than the configured maximum age
    Stale,
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CacheMiss::Absent => "absent",
            CacheMiss::Corrupt => "corrupt",
            CacheMiss::FormatMismatch => "format version mismatch",
            CacheMiss::Stale => "stale",
        };
        f.write_str(reason)
    }
}

/// Where a published artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphOrigin {
    Cache,
    Catalog,
}

/// A loaded or freshly built artifact with its header
#[derive(Debug, Clone)]
pub struct Artifact<T> {
    pub value: T,
    pub metadata: CacheMetadata,
    pub origin: GraphOrigin,
}

/// One cache file holding a `T` payload
#[derive(Debug)]
pub struct ArtifactStore<T> {
    path: PathBuf,
    max_age: Option<Duration>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> ArtifactStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>, max_age: Option<Duration>) -> Self {
        Self {
            path: path.into(),
            max_age,
            _payload: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the artifact, reporting why it could not be used
    pub fn try_load(&self) -> std::result::Result<(CacheMetadata, T), CacheMiss> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CacheMiss::Absent),
            Err(e) => {
                warn!("Cannot open cache {}: {}", self.path.display(), e);
                return Err(CacheMiss::Corrupt);
            }
        };
        let file_len = match file.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                warn!("Cannot stat cache {}: {}", self.path.display(), e);
                return Err(CacheMiss::Corrupt);
            }
        };
        let mut reader = BufReader::new(file);

        let metadata: CacheMetadata = codec(file_len).deserialize_from(&mut reader).map_err(|e| {
            warn!("Cache header of {} is unreadable: {}", self.path.display(), e);
            CacheMiss::Corrupt
        })?;

        if metadata.format_version != CACHE_FORMAT_VERSION {
            return Err(CacheMiss::FormatMismatch);
        }
        if let Some(max_age) = self.max_age {
            if age_of(metadata.built_at) > max_age {
                return Err(CacheMiss::Stale);
            }
        }

        let payload: T = codec(file_len).deserialize_from(&mut reader).map_err(|e| {
            warn!("Cache payload of {} is unreadable: {}", self.path.display(), e);
            CacheMiss::Corrupt
        })?;

        Ok((metadata, payload))
    }

    /// Load the artifact, logging the reason on a miss
    pub fn load(&self) -> Option<(CacheMetadata, T)> {
        match self.try_load() {
            Ok(loaded) => Some(loaded),
            Err(CacheMiss::Absent) => {
                info!("No cache at {}", self.path.display());
                None
            }
            Err(miss) => {
                warn!("Discarding cache {}: {}", self.path.display(), miss);
                None
            }
        }
    }

    /// Durably replace the artifact
    pub fn store(&self, metadata: &CacheMetadata, payload: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("bin.tmp");
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        codec(MAX_ARTIFACT_BYTES)
            .serialize_into(&mut writer, metadata)
            .map_err(|e| Error::Cache(format!("Failed to encode cache header: {}", e)))?;
        codec(MAX_ARTIFACT_BYTES)
            .serialize_into(&mut writer, payload)
            .map_err(|e| Error::Cache(format!("Failed to encode cache payload: {}", e)))?;
        writer.flush()?;

        let file = writer
            .into_inner()
            .map_err(|e| Error::Cache(format!("Failed to flush cache file: {}", e)))?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Graph and name-lookup cache rooted at one folder
#[derive(Debug, Clone)]
pub struct GraphCache {
    folder: PathBuf,
    max_age: Option<Duration>,
}

impl GraphCache {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            max_age: None,
        }
    }

    /// Treat artifacts older than `max_age` as stale
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn graph_store(&self) -> ArtifactStore<CollaborationGraph> {
        ArtifactStore::new(self.folder.join(GRAPH_CACHE_FILE), self.max_age)
    }

    pub fn names_store(&self) -> ArtifactStore<NameLookup> {
        ArtifactStore::new(self.folder.join(ARTIST_CACHE_FILE), self.max_age)
    }

    /// Load the cached graph if present, current and structurally valid
    pub async fn load_graph(&self) -> Result<Option<Artifact<Arc<CollaborationGraph>>>> {
        let store = self.graph_store();
        let loaded = tokio::task::spawn_blocking(move || {
            let (metadata, graph) = store.load()?;
            if let Err(problem) = graph.validate() {
                warn!("Discarding cache {}: {}", store.path().display(), problem);
                return None;
            }
            Some((metadata, graph))
        })
        .await?;

        Ok(loaded.map(|(metadata, graph)| Artifact {
            value: Arc::new(graph),
            metadata,
            origin: GraphOrigin::Cache,
        }))
    }

    pub async fn store_graph(&self, graph: Arc<CollaborationGraph>) -> Result<CacheMetadata> {
        let store = self.graph_store();
        tokio::task::spawn_blocking(move || -> Result<CacheMetadata> {
            let metadata = CacheMetadata::for_graph(&graph);
            store.store(&metadata, &graph)?;
            info!("Graph cached to {}", store.path().display());
            Ok(metadata)
        })
        .await?
    }

    /// Load the graph from cache unless forced, otherwise build and store it
    ///
    /// A failed store is logged and the freshly built graph is still returned.
    pub async fn get_or_build_graph(
        &self,
        catalog: &dyn Catalog,
        force_rebuild: bool,
        canonical_order: bool,
    ) -> Result<Artifact<Arc<CollaborationGraph>>> {
        if !force_rebuild {
            let started = std::time::Instant::now();
            if let Some(cached) = self.load_graph().await? {
                info!(
                    "Loaded graph with {} artists from cache in {}",
                    cached.value.len(),
                    format_seconds(started.elapsed())
                );
                return Ok(cached);
            }
        }

        info!("Building graph from {} catalog", catalog.name());
        let graph = graph::build_from_stream(catalog.stream_collaborations(), canonical_order).await?;
        let graph = Arc::new(graph);

        let metadata = match self.store_graph(Arc::clone(&graph)).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Failed to cache graph: {}", e);
                CacheMetadata::for_graph(&graph)
            }
        };

        Ok(Artifact {
            value: graph,
            metadata,
            origin: GraphOrigin::Catalog,
        })
    }

    pub async fn load_names(&self) -> Result<Option<Artifact<Arc<NameLookup>>>> {
        let store = self.names_store();
        let loaded = tokio::task::spawn_blocking(move || store.load()).await?;

        Ok(loaded.map(|(metadata, names)| Artifact {
            value: Arc::new(names),
            metadata,
            origin: GraphOrigin::Cache,
        }))
    }

    pub async fn store_names(&self, names: Arc<NameLookup>) -> Result<CacheMetadata> {
        let store = self.names_store();
        tokio::task::spawn_blocking(move || -> Result<CacheMetadata> {
            let metadata = CacheMetadata::new(names.len(), 0);
            store.store(&metadata, &names)?;
            Ok(metadata)
        })
        .await?
    }

    /// Same contract as [`get_or_build_graph`](Self::get_or_build_graph) for the name lookup
    pub async fn get_or_build_names(
        &self,
        catalog: &dyn Catalog,
        force_rebuild: bool,
    ) -> Result<Artifact<Arc<NameLookup>>> {
        if !force_rebuild {
            if let Some(cached) = self.load_names().await? {
                info!("Loaded {} artist names from cache", cached.value.len());
                return Ok(cached);
            }
        }

        let names = Arc::new(NameLookup::build_from_stream(catalog.stream_artist_names()).await?);
        let metadata = match self.store_names(Arc::clone(&names)).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Failed to cache artist names: {}", e);
                CacheMetadata::new(names.len(), 0)
            }
        };

        Ok(Artifact {
            value: names,
            metadata,
            origin: GraphOrigin::Catalog,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use sdos_common::{ArtistId, ArtistName, CollaborationRecord};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn sample_graph() -> CollaborationGraph {
        graph::build_from_records(
            vec![
                CollaborationRecord::new(1, "SongA", vec![10, 20]),
                CollaborationRecord::new(2, "SongB", vec![20, 30]),
                CollaborationRecord::new(3, "SongC", vec![10, 30, 40]),
            ],
            false,
        )
    }

    fn edge_set(graph: &CollaborationGraph) -> BTreeSet<(ArtistId, ArtistId, String)> {
        graph
            .artists()
            .flat_map(|a| graph.neighbors(a).map(move |(b, w)| (a, b, w.to_string())))
            .collect()
    }

    fn sample_catalog() -> MemoryCatalog {
        MemoryCatalog::new()
            .with_record(1, "SongA", &[10, 20])
            .with_record(2, "SongB", &[20, 30])
            .with_artist(10, "Ten", None)
            .with_artist(20, "Twenty", None)
    }

    #[test]
    fn test_round_trip_preserves_graph() {
        let dir = TempDir::new().unwrap();
        let cache = GraphCache::new(dir.path());
        let graph = sample_graph();

        cache
            .graph_store()
            .store(&CacheMetadata::for_graph(&graph), &graph)
            .unwrap();
        let (metadata, loaded) = cache.graph_store().try_load().unwrap();

        assert_eq!(metadata.artist_count, 4);
        assert_eq!(metadata.edge_count, graph.edge_count());
        assert_eq!(edge_set(&loaded), edge_set(&graph));
        assert!(!dir.path().join("collaboration_graph.bin.tmp").exists());
    }

    #[test]
    fn test_missing_artifact_is_absent() {
        let dir = TempDir::new().unwrap();
        let miss = GraphCache::new(dir.path()).graph_store().try_load().unwrap_err();
        assert_eq!(miss, CacheMiss::Absent);
    }

    #[test]
    fn test_garbage_artifact_is_corrupt() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(GRAPH_CACHE_FILE), b"not a graph at all").unwrap();

        let miss = GraphCache::new(dir.path()).graph_store().try_load().unwrap_err();
        assert_eq!(miss, CacheMiss::Corrupt);
    }

    #[test]
    fn test_oversized_length_prefix_is_corrupt() {
        let dir = TempDir::new().unwrap();
        // format_version 1, then a builder_version string claiming 3 GiB
        let mut bytes = 1u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(3u64 << 30).to_le_bytes());
        bytes.extend_from_slice(b"1.0.");
        assert_eq!(bytes.len(), 16);
        std::fs::write(dir.path().join(GRAPH_CACHE_FILE), &bytes).unwrap();

        let miss = GraphCache::new(dir.path()).graph_store().try_load().unwrap_err();
        assert_eq!(miss, CacheMiss::Corrupt);
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let cache = GraphCache::new(dir.path());
        let graph = sample_graph();
        cache
            .graph_store()
            .store(&CacheMetadata::for_graph(&graph), &graph)
            .unwrap();

        let path = dir.path().join(GRAPH_CACHE_FILE);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

        assert_eq!(cache.graph_store().try_load().unwrap_err(), CacheMiss::Corrupt);
    }

    #[test]
    fn test_other_format_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let cache = GraphCache::new(dir.path());
        let graph = sample_graph();
        let mut metadata = CacheMetadata::for_graph(&graph);
        metadata.format_version = CACHE_FORMAT_VERSION + 1;
        cache.graph_store().store(&metadata, &graph).unwrap();

        assert_eq!(
            cache.graph_store().try_load().unwrap_err(),
            CacheMiss::FormatMismatch
        );
    }

    #[test]
    fn test_old_artifact_is_stale_only_with_max_age() {
        let dir = TempDir::new().unwrap();
        let graph = sample_graph();
        let mut metadata = CacheMetadata::for_graph(&graph);
        metadata.built_at = now() - chrono::Duration::hours(48);
        GraphCache::new(dir.path())
            .graph_store()
            .store(&metadata, &graph)
            .unwrap();

        let unlimited = GraphCache::new(dir.path());
        assert!(unlimited.graph_store().try_load().is_ok());

        let limited = GraphCache::new(dir.path()).with_max_age(Some(Duration::from_secs(3600)));
        assert_eq!(limited.graph_store().try_load().unwrap_err(), CacheMiss::Stale);
    }

    #[tokio::test]
    async fn test_invalid_graph_is_not_loaded() {
        let dir = TempDir::new().unwrap();
        let cache = GraphCache::new(dir.path());
        let mut graph = sample_graph();
        graph.adjacency[0].pop();
        cache
            .graph_store()
            .store(&CacheMetadata::for_graph(&graph), &graph)
            .unwrap();

        assert!(cache.load_graph().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_or_build_uses_cache_after_first_build() {
        let dir = TempDir::new().unwrap();
        let cache = GraphCache::new(dir.path());
        let catalog = sample_catalog();

        let first = cache.get_or_build_graph(&catalog, false, false).await.unwrap();
        assert_eq!(first.origin, GraphOrigin::Catalog);
        assert_eq!(catalog.collaboration_passes(), 1);

        let second = cache.get_or_build_graph(&catalog, false, false).await.unwrap();
        assert_eq!(second.origin, GraphOrigin::Cache);
        assert_eq!(catalog.collaboration_passes(), 1);
        assert_eq!(edge_set(&first.value), edge_set(&second.value));

        let forced = cache.get_or_build_graph(&catalog, true, false).await.unwrap();
        assert_eq!(forced.origin, GraphOrigin::Catalog);
        assert_eq!(catalog.collaboration_passes(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_cache_triggers_rebuild() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(GRAPH_CACHE_FILE), [0xffu8; 64]).unwrap();
        let cache = GraphCache::new(dir.path());
        let catalog = sample_catalog();

        let artifact = cache.get_or_build_graph(&catalog, false, false).await.unwrap();
        assert_eq!(artifact.origin, GraphOrigin::Catalog);
        assert_eq!(artifact.value.edge_count(), 2);

        // The rebuilt graph replaced the corrupt file
        assert!(cache.graph_store().try_load().is_ok());
    }

    #[tokio::test]
    async fn test_store_failure_still_returns_graph() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-folder");
        std::fs::write(&blocker, b"file").unwrap();
        let cache = GraphCache::new(&blocker);
        let catalog = sample_catalog();

        let artifact = cache.get_or_build_graph(&catalog, false, false).await.unwrap();
        assert_eq!(artifact.value.len(), 3);
    }

    #[tokio::test]
    async fn test_build_failure_leaves_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let cache = GraphCache::new(dir.path());
        cache
            .get_or_build_graph(&sample_catalog(), false, false)
            .await
            .unwrap();

        let failing = sample_catalog().failing_after(1);
        let result = cache.get_or_build_graph(&failing, true, false).await;
        assert!(matches!(result, Err(Error::CatalogUnavailable(_))));

        let (metadata, _) = cache.graph_store().try_load().unwrap();
        assert_eq!(metadata.edge_count, 2);
    }

    #[tokio::test]
    async fn test_names_build_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = GraphCache::new(dir.path());
        let catalog = sample_catalog();

        let built = cache.get_or_build_names(&catalog, false).await.unwrap();
        assert_eq!(built.origin, GraphOrigin::Catalog);
        let loaded = cache.get_or_build_names(&catalog, false).await.unwrap();
        assert_eq!(loaded.origin, GraphOrigin::Cache);
        assert_eq!(catalog.name_passes(), 1);
        assert_eq!(loaded.value.get(20), Some(&ArtistName::new("Twenty", None)));
    }
}
