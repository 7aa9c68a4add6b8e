//! Graph manager
//!
//! Owns the process-wide collaboration graph and artist name lookup, and is
//! the query interface used by the HTTP API and the CLI.
//!
//! The published graph is an immutable [`GraphSnapshot`] behind an `Arc`.
//! Readers clone the `Arc` under a short read lock and traverse without
//! holding any lock; a rebuild swaps the `Arc` under a short write lock once
//! the new graph is complete. Every load or build runs under `build_lock`, so
//! at most one is in flight. A rebuild request that had to wait for another
//! catalog build returns that build's result instead of starting a new one.

use chrono::{DateTime, Utc};
use sdos_common::config::{GraphConfig, Readiness};
use sdos_common::time::format_seconds;
use sdos_common::{ArtistId, ArtistMatch};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{Artifact, GraphCache, GraphOrigin};
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::graph::{CollaborationGraph, NameLookup};
use crate::search::{self, ExcludedEdges, Hop, Path, SearchLimits, SearchStats};

/// Behavior knobs taken from the `[graph]` config section
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerSettings {
    pub canonical_order: bool,
    pub readiness: Readiness,
    pub limits: SearchLimits,
}

impl ManagerSettings {
    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            canonical_order: config.canonical_order,
            readiness: config.readiness,
            limits: SearchLimits {
                max_expansions: config.max_node_expansions,
            },
        }
    }

    /// Cache age limit from the same config section
    pub fn max_cache_age(config: &GraphConfig) -> Option<Duration> {
        config
            .max_cache_age_hours
            .map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
    }
}

/// A published, immutable graph
#[derive(Debug)]
pub struct GraphSnapshot {
    pub graph: Arc<CollaborationGraph>,
    /// Increases by one with every publication
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub origin: GraphOrigin,
}

/// A shortest-path request
#[derive(Debug, Clone, Default)]
pub struct PathQuery {
    pub source: ArtistId,
    pub target: ArtistId,
    pub excluded_edges: ExcludedEdges,
    /// Rebuild the graph from the catalog before searching
    pub force_rebuild: bool,
}

impl PathQuery {
    pub fn new(source: ArtistId, target: ArtistId) -> Self {
        Self {
            source,
            target,
            ..Default::default()
        }
    }

    pub fn excluding(mut self, excluded_edges: ExcludedEdges) -> Self {
        self.excluded_edges = excluded_edges;
        self
    }

    pub fn with_rebuild(mut self, force_rebuild: bool) -> Self {
        self.force_rebuild = force_rebuild;
        self
    }
}

/// Result of a path query; `found == false` is a normal outcome
#[derive(Debug, Clone, Serialize)]
pub struct PathOutcome {
    pub found: bool,
    pub path: Path,
    pub hop_count: usize,
    #[serde(skip)]
    pub stats: SearchStats,
    #[serde(skip)]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub graph_size: usize,
    pub edge_count: usize,
    pub generation: u64,
}

impl RebuildSummary {
    fn of(snapshot: &GraphSnapshot) -> Self {
        Self {
            graph_size: snapshot.graph.len(),
            edge_count: snapshot.graph.edge_count(),
            generation: snapshot.generation,
        }
    }
}

/// One described hop: who, to whom, and through which recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStep {
    pub from_id: ArtistId,
    pub from_name: String,
    pub to_id: ArtistId,
    pub to_name: String,
    pub to_mbid: Option<String>,
    pub work: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStatus {
    pub ready: bool,
    pub generation: u64,
    pub artists: usize,
    pub edges: usize,
    pub built_at: Option<DateTime<Utc>>,
    pub origin: Option<GraphOrigin>,
    pub names_loaded: bool,
}

pub struct GraphManager {
    catalog: Arc<dyn Catalog>,
    cache: GraphCache,
    settings: ManagerSettings,
    snapshot: RwLock<Option<Arc<GraphSnapshot>>>,
    names: RwLock<Option<Arc<NameLookup>>>,
    build_lock: Mutex<()>,
    names_lock: Mutex<()>,
    generation: AtomicU64,
    /// Completed catalog builds, used to coalesce rebuild requests
    catalog_builds: AtomicU64,
}

impl GraphManager {
    pub fn new(catalog: Arc<dyn Catalog>, cache: GraphCache, settings: ManagerSettings) -> Self {
        Self {
            catalog,
            cache,
            settings,
            snapshot: RwLock::new(None),
            names: RwLock::new(None),
            build_lock: Mutex::new(()),
            names_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            catalog_builds: AtomicU64::new(0),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Load or build the graph, then the name lookup, in the background
    ///
    /// Failures are logged; a later query retries the graph load.
    pub fn spawn_warmup(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            info!("Warming up collaboration graph");
            match manager.ensure_loaded().await {
                Ok(snapshot) => info!(
                    "Graph ready: {} artists, {} collaborations (generation {})",
                    snapshot.graph.len(),
                    snapshot.graph.edge_count(),
                    snapshot.generation
                ),
                Err(e) => warn!("Graph warm-up failed: {}", e),
            }

            if let Err(e) = manager.ensure_names().await {
                warn!("Artist name warm-up failed: {}", e);
            }
        })
    }

    /// Currently published snapshot, if any
    pub async fn current(&self) -> Option<Arc<GraphSnapshot>> {
        self.snapshot.read().await.clone()
    }

    pub async fn is_ready(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    /// Snapshot to query, honoring the readiness policy
    pub async fn graph(&self) -> Result<Arc<GraphSnapshot>> {
        if let Some(snapshot) = self.current().await {
            return Ok(snapshot);
        }
        match self.settings.readiness {
            Readiness::FailFast => Err(Error::NotReady),
            Readiness::Wait => self.ensure_loaded().await,
        }
    }

    /// Publish a graph from cache or catalog unless one is already published
    pub async fn ensure_loaded(&self) -> Result<Arc<GraphSnapshot>> {
        let _guard = self.build_lock.lock().await;
        if let Some(snapshot) = self.current().await {
            return Ok(snapshot);
        }

        let artifact = self
            .cache
            .get_or_build_graph(self.catalog.as_ref(), false, self.settings.canonical_order)
            .await?;
        Ok(self.publish(artifact).await)
    }

    /// Rebuild the graph from the catalog and publish it
    ///
    /// On failure the previous snapshot keeps serving.
    pub async fn rebuild(&self) -> Result<RebuildSummary> {
        let snapshot = self.rebuild_snapshot().await?;
        Ok(RebuildSummary::of(&snapshot))
    }

    async fn rebuild_snapshot(&self) -> Result<Arc<GraphSnapshot>> {
        let requested = self.catalog_builds.load(Ordering::SeqCst);
        let _guard = self.build_lock.lock().await;

        if self.catalog_builds.load(Ordering::SeqCst) != requested {
            if let Some(snapshot) = self.current().await {
                info!(
                    "Rebuild coalesced with the build that just finished (generation {})",
                    snapshot.generation
                );
                return Ok(snapshot);
            }
        }

        info!("Rebuilding collaboration graph from catalog");
        let artifact = self
            .cache
            .get_or_build_graph(self.catalog.as_ref(), true, self.settings.canonical_order)
            .await?;
        Ok(self.publish(artifact).await)
    }

    async fn publish(&self, artifact: Artifact<Arc<CollaborationGraph>>) -> Arc<GraphSnapshot> {
        if artifact.origin == GraphOrigin::Catalog {
            self.catalog_builds.fetch_add(1, Ordering::SeqCst);
        }
        let snapshot = Arc::new(GraphSnapshot {
            graph: artifact.value,
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            built_at: artifact.metadata.built_at,
            origin: artifact.origin,
        });

        *self.snapshot.write().await = Some(Arc::clone(&snapshot));
        debug!("Published graph generation {}", snapshot.generation);
        snapshot
    }

    /// Load the name lookup from cache, building it from the catalog on a miss
    pub async fn ensure_names(&self) -> Result<Arc<NameLookup>> {
        let _guard = self.names_lock.lock().await;
        if let Some(names) = self.names.read().await.clone() {
            return Ok(names);
        }

        let artifact = self
            .cache
            .get_or_build_names(self.catalog.as_ref(), false)
            .await?;
        *self.names.write().await = Some(Arc::clone(&artifact.value));
        Ok(artifact.value)
    }

    /// Find the shortest collaboration path for a query
    pub async fn find_path(&self, query: PathQuery) -> Result<PathOutcome> {
        let snapshot = if query.force_rebuild {
            self.rebuild_snapshot().await?
        } else {
            self.graph().await?
        };

        let graph = &snapshot.graph;
        let mut missing = Vec::new();
        if !graph.contains(query.source) {
            missing.push(query.source);
        }
        if !graph.contains(query.target) && query.target != query.source {
            missing.push(query.target);
        }
        if !missing.is_empty() {
            return Err(Error::EntityNotInGraph { missing });
        }

        let graph = Arc::clone(graph);
        let limits = self.settings.limits;
        let PathQuery {
            source,
            target,
            excluded_edges,
            ..
        } = query;
        let started = Instant::now();
        let (path, stats) = tokio::task::spawn_blocking(move || {
            search::find_path_with_limits(&graph, source, target, &excluded_edges, limits)
        })
        .await??;
        let elapsed = started.elapsed();

        debug!(
            "Path search {} -> {}: expanded {}, visited {}/{} in {}",
            source,
            target,
            stats.expanded,
            stats.visited_source,
            stats.visited_target,
            format_seconds(elapsed)
        );

        let path = path.unwrap_or_default();
        Ok(PathOutcome {
            found: !path.is_empty(),
            hop_count: path.len(),
            path,
            stats,
            elapsed,
        })
    }

    /// Attach display names and MBIDs to every hop of a path
    ///
    /// Names come from the lookup table, then a catalog point lookup, then
    /// an `<id:N>` placeholder.
    pub async fn describe_path(&self, source: ArtistId, path: &[Hop]) -> Vec<PathStep> {
        let names = self.names.read().await.clone();

        let mut steps = Vec::with_capacity(path.len());
        let (mut from_id, mut from_name) = (source, self.resolve_name(names.as_deref(), source).await.0);
        for hop in path {
            let (to_name, to_mbid) = self.resolve_name(names.as_deref(), hop.artist).await;
            steps.push(PathStep {
                from_id,
                from_name: std::mem::replace(&mut from_name, to_name.clone()),
                to_id: hop.artist,
                to_name,
                to_mbid,
                work: hop.work.clone(),
            });
            from_id = hop.artist;
        }
        steps
    }

    async fn resolve_name(
        &self,
        names: Option<&NameLookup>,
        id: ArtistId,
    ) -> (String, Option<String>) {
        if let Some(name) = names.and_then(|names| names.get(id)) {
            return (name.name.clone(), name.mbid.clone());
        }

        match self.catalog.lookup_artist(id).await {
            Ok(Some(name)) => (name.name, name.mbid),
            Ok(None) => (format!("<id:{}>", id), None),
            Err(e) => {
                warn!("Name lookup for artist {} failed: {}", id, e);
                (format!("<id:{}>", id), None)
            }
        }
    }

    /// Ranked artist search, passed through to the catalog
    pub async fn search_artists(&self, query: &str, limit: usize) -> Result<Vec<ArtistMatch>> {
        self.catalog.search_artists(query, limit).await
    }

    pub async fn status(&self) -> GraphStatus {
        let snapshot = self.current().await;
        let names_loaded = self.names.read().await.is_some();

        match snapshot {
            Some(snapshot) => GraphStatus {
                ready: true,
                generation: snapshot.generation,
                artists: snapshot.graph.len(),
                edges: snapshot.graph.edge_count(),
                built_at: Some(snapshot.built_at),
                origin: Some(snapshot.origin),
                names_loaded,
            },
            None => GraphStatus {
                ready: false,
                generation: 0,
                artists: 0,
                edges: 0,
                built_at: None,
                origin: None,
                names_loaded,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use tempfile::TempDir;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new()
            .with_record(1, "SongA", &[10, 20])
            .with_record(2, "SongB", &[20, 30])
            .with_record(3, "SongC", &[10, 30])
            .with_artist(10, "Alpha", Some("mbid-10"))
            .with_artist(20, "Beta", None)
    }

    fn manager(dir: &TempDir, catalog: MemoryCatalog) -> GraphManager {
        GraphManager::new(
            Arc::new(catalog),
            GraphCache::new(dir.path()),
            ManagerSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_find_path_loads_graph_on_demand() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, catalog());
        assert!(!manager.is_ready().await);

        let outcome = manager.find_path(PathQuery::new(10, 30)).await.unwrap();
        assert!(outcome.found);
        assert_eq!(outcome.hop_count, 1);
        assert_eq!(outcome.path, vec![Hop::new(30, Some("SongC"))]);

        let status = manager.status().await;
        assert!(status.ready);
        assert_eq!(status.generation, 1);
        assert_eq!(status.origin, Some(GraphOrigin::Catalog));
    }

    #[tokio::test]
    async fn test_missing_endpoints_error() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, catalog());

        let err = manager.find_path(PathQuery::new(10, 99)).await.unwrap_err();
        assert!(matches!(err, Error::EntityNotInGraph { missing } if missing == vec![99]));

        let err = manager.find_path(PathQuery::new(77, 77)).await.unwrap_err();
        assert!(matches!(err, Error::EntityNotInGraph { missing } if missing == vec![77]));
    }

    #[tokio::test]
    async fn test_fail_fast_before_ready() {
        let dir = TempDir::new().unwrap();
        let manager = GraphManager::new(
            Arc::new(catalog()),
            GraphCache::new(dir.path()),
            ManagerSettings {
                readiness: Readiness::FailFast,
                ..Default::default()
            },
        );

        let err = manager.find_path(PathQuery::new(10, 30)).await.unwrap_err();
        assert!(matches!(err, Error::NotReady));

        manager.ensure_loaded().await.unwrap();
        assert!(manager.find_path(PathQuery::new(10, 30)).await.unwrap().found);
    }

    #[tokio::test]
    async fn test_excluded_edges_do_not_touch_graph() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, catalog());
        let excluded: ExcludedEdges = [(10, 30)].into_iter().collect();

        let detour = manager
            .find_path(PathQuery::new(10, 30).excluding(excluded))
            .await
            .unwrap();
        assert_eq!(detour.hop_count, 2);

        let direct = manager.find_path(PathQuery::new(10, 30)).await.unwrap();
        assert_eq!(direct.hop_count, 1);
    }

    #[tokio::test]
    async fn test_rebuild_increments_generation() {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(catalog());
        let manager = GraphManager::new(
            catalog.clone(),
            GraphCache::new(dir.path()),
            ManagerSettings::default(),
        );

        manager.ensure_loaded().await.unwrap();
        let summary = manager.rebuild().await.unwrap();
        assert_eq!(summary.generation, 2);
        assert_eq!(summary.graph_size, 3);
        assert_eq!(summary.edge_count, 3);
        assert_eq!(catalog.collaboration_passes(), 2);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        // Seed the cache so the first load does not touch the failing catalog
        manager(&dir, catalog()).ensure_loaded().await.unwrap();

        let manager = manager(&dir, catalog().failing_after(1));
        manager.ensure_loaded().await.unwrap();

        let err = manager.rebuild().await.unwrap_err();
        assert!(matches!(err, Error::CatalogUnavailable(_)));
        let status = manager.status().await;
        assert_eq!(status.generation, 1);
        assert_eq!(status.origin, Some(GraphOrigin::Cache));
    }

    #[tokio::test]
    async fn test_describe_path_name_fallbacks() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, catalog());
        let path = vec![Hop::new(20, Some("SongA")), Hop::new(30, Some("SongB"))];

        // Without a name table every name comes from the catalog lookup
        let steps = manager.describe_path(10, &path).await;
        assert_eq!(steps[0].from_name, "Alpha");
        assert_eq!(steps[0].to_name, "Beta");
        assert_eq!(steps[1].from_id, 20);
        assert_eq!(steps[1].from_name, "Beta");
        assert_eq!(steps[1].to_name, "<id:30>");
        assert_eq!(steps[1].to_mbid, None);
        assert_eq!(steps[1].work.as_deref(), Some("SongB"));

        manager.ensure_names().await.unwrap();
        let steps = manager.describe_path(20, &[Hop::new(10, Some("SongA"))]).await;
        assert_eq!(steps[0].to_mbid.as_deref(), Some("mbid-10"));
    }

    #[test]
    fn test_max_cache_age_saturates() {
        let config = GraphConfig {
            max_cache_age_hours: Some(u64::MAX / 1000),
            ..Default::default()
        };
        assert_eq!(
            ManagerSettings::max_cache_age(&config),
            Some(Duration::from_secs(u64::MAX))
        );

        let config = GraphConfig {
            max_cache_age_hours: Some(2),
            ..Default::default()
        };
        assert_eq!(
            ManagerSettings::max_cache_age(&config),
            Some(Duration::from_secs(7200))
        );
        assert_eq!(ManagerSettings::max_cache_age(&GraphConfig::default()), None);
    }

    #[tokio::test]
    async fn test_warmup_publishes_graph_and_names() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(manager(&dir, catalog()));

        manager.spawn_warmup().await.unwrap();
        let status = manager.status().await;
        assert!(status.ready);
        assert!(status.names_loaded);
    }
}
