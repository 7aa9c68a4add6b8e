//! Graph construction from catalog records
//!
//! Every unordered artist pair on a recording becomes an edge unless the pair
//! was already seen: the first recording streamed for a pair is the one that
//! labels the edge. Self-pairs and records with fewer than two artists are
//! dropped. The graph is assembled entirely in memory and only handed out once
//! the whole stream has been consumed, so a failing stream yields no graph.

use futures::{Stream, TryStreamExt};
use sdos_common::time::format_seconds;
use sdos_common::{ArtistId, CollaborationRecord};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

use super::{CollaborationGraph, Slot, WorkSlot};
use crate::error::Result;

/// Progress is logged every this many records
const PROGRESS_INTERVAL: usize = 10_000;

/// Incremental collaboration graph builder
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: CollaborationGraph,
    seen_pairs: HashSet<(ArtistId, ArtistId)>,
    work_slots: HashMap<i64, WorkSlot>,
    canonical_order: bool,
    records_processed: usize,
    records_skipped: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort every adjacency list by neighbor id when finishing
    pub fn with_canonical_order(mut self, canonical_order: bool) -> Self {
        self.canonical_order = canonical_order;
        self
    }

    pub fn records_processed(&self) -> usize {
        self.records_processed
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count
    }

    /// Add one record, returning the number of new edges it contributed
    pub fn add_record(&mut self, record: &CollaborationRecord) -> usize {
        self.records_processed += 1;

        let artists = &record.artists;
        if artists.len() < 2 {
            self.records_skipped += 1;
            return 0;
        }

        let mut added = 0;
        for i in 0..artists.len() {
            for j in (i + 1)..artists.len() {
                let (a, b) = (artists[i], artists[j]);
                if a == b {
                    continue;
                }
                if !self.seen_pairs.insert((a.min(b), a.max(b))) {
                    continue;
                }

                let work = self.intern_work(record);
                let slot_a = self.intern_artist(a);
                let slot_b = self.intern_artist(b);
                self.graph.adjacency[slot_a as usize].push((slot_b, work));
                self.graph.adjacency[slot_b as usize].push((slot_a, work));
                self.graph.edge_count += 1;
                added += 1;
            }
        }
        added
    }

    /// Consume the builder and return the finished graph
    pub fn finish(mut self) -> CollaborationGraph {
        if self.canonical_order {
            let ids = &self.graph.ids;
            for neighbors in &mut self.graph.adjacency {
                neighbors.sort_by_key(|&(neighbor, _)| ids[neighbor as usize]);
            }
        }

        if self.records_skipped > 0 {
            debug!(
                "Skipped {} records with fewer than two artists",
                self.records_skipped
            );
        }
        self.graph
    }

    fn intern_artist(&mut self, artist: ArtistId) -> Slot {
        if let Some(&slot) = self.graph.index.get(&artist) {
            return slot;
        }
        let slot = self.graph.ids.len() as Slot;
        self.graph.ids.push(artist);
        self.graph.adjacency.push(Vec::new());
        self.graph.index.insert(artist, slot);
        slot
    }

    fn intern_work(&mut self, record: &CollaborationRecord) -> WorkSlot {
        if let Some(&slot) = self.work_slots.get(&record.work_id) {
            return slot;
        }
        let slot = self.graph.works.len() as WorkSlot;
        self.graph.works.push(record.work_title.clone());
        self.work_slots.insert(record.work_id, slot);
        slot
    }
}

/// Build a graph from an in-memory sequence of records
pub fn build_from_records<I>(records: I, canonical_order: bool) -> CollaborationGraph
where
    I: IntoIterator<Item = CollaborationRecord>,
{
    let mut builder = GraphBuilder::new().with_canonical_order(canonical_order);
    for record in records {
        builder.add_record(&record);
    }
    builder.finish()
}

/// Build a graph by draining a catalog stream
///
/// Any stream error aborts the build and is returned as-is.
pub async fn build_from_stream<S>(records: S, canonical_order: bool) -> Result<CollaborationGraph>
where
    S: Stream<Item = Result<CollaborationRecord>>,
{
    info!("Building collaboration graph...");
    let started = Instant::now();
    let mut builder = GraphBuilder::new().with_canonical_order(canonical_order);

    futures::pin_mut!(records);
    while let Some(record) = records.try_next().await? {
        builder.add_record(&record);
        if builder.records_processed() % PROGRESS_INTERVAL == 0 {
            info!(
                "Processed {} recordings, found {} collaborations so far...",
                builder.records_processed(),
                builder.edge_count()
            );
        }
    }

    let records = builder.records_processed();
    let graph = builder.finish();
    info!(
        "Graph built with {} artists, {} unique collaborations and {} recordings from {} records in {}",
        graph.len(),
        graph.edge_count(),
        graph.work_count(),
        records,
        format_seconds(started.elapsed())
    );
    Ok(graph)
}
