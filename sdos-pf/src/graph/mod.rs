//! Collaboration graph
//!
//! Undirected artist graph where every edge carries the one recording that
//! evidences the collaboration. Storage is arena style: artists get a dense
//! slot, adjacency lists hold `(neighbor_slot, work_slot)` pairs and recording
//! titles are interned once in `works`.
//!
//! Invariants (checked by [`CollaborationGraph::validate`] after a cache load):
//! - every artist key has at least one edge
//! - if `(b, w)` is in `graph[a]` then `(a, w)` is in `graph[b]`
//! - at most one edge per unordered artist pair

use sdos_common::ArtistId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod builder;
pub mod names;

pub use builder::{build_from_records, build_from_stream, GraphBuilder};
pub use names::NameLookup;

/// Dense artist index inside a graph
pub type Slot = u32;

/// Dense index into the interned recording titles
pub type WorkSlot = u32;

/// Immutable collaboration graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollaborationGraph {
    pub(crate) ids: Vec<ArtistId>,
    pub(crate) index: HashMap<ArtistId, Slot>,
    pub(crate) adjacency: Vec<Vec<(Slot, WorkSlot)>>,
    pub(crate) works: Vec<String>,
    pub(crate) edge_count: usize,
}

impl CollaborationGraph {
    /// Number of artists with at least one collaboration
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of distinct recordings used as edge labels
    pub fn work_count(&self) -> usize {
        self.works.len()
    }

    pub fn contains(&self, artist: ArtistId) -> bool {
        self.index.contains_key(&artist)
    }

    /// Number of collaborators of an artist (0 when absent)
    pub fn degree(&self, artist: ArtistId) -> usize {
        self.slot(artist)
            .map(|slot| self.adjacency[slot as usize].len())
            .unwrap_or(0)
    }

    /// Artists in the graph, in slot order
    pub fn artists(&self) -> impl Iterator<Item = ArtistId> + '_ {
        self.ids.iter().copied()
    }

    /// Collaborators of an artist with the recording that links them
    ///
    /// Yields nothing for artists that are not in the graph.
    pub fn neighbors(&self, artist: ArtistId) -> impl Iterator<Item = (ArtistId, &str)> + '_ {
        self.slot(artist).into_iter().flat_map(move |slot| {
            self.adjacency[slot as usize]
                .iter()
                .map(move |&(neighbor, work)| (self.ids[neighbor as usize], self.work_title(work)))
        })
    }

    pub(crate) fn slot(&self, artist: ArtistId) -> Option<Slot> {
        self.index.get(&artist).copied()
    }

    pub(crate) fn artist_at(&self, slot: Slot) -> ArtistId {
        self.ids[slot as usize]
    }

    pub(crate) fn slot_neighbors(&self, slot: Slot) -> &[(Slot, WorkSlot)] {
        &self.adjacency[slot as usize]
    }

    pub(crate) fn work_title(&self, work: WorkSlot) -> &str {
        &self.works[work as usize]
    }

    /// Check structural consistency of a deserialized graph
    ///
    /// Symmetry and pair uniqueness are checked by sorting every adjacency
    /// entry as `(low, high, work)`: each edge must show up exactly twice.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.ids.len();
        if self.index.len() != n || self.adjacency.len() != n {
            return Err(format!(
                "length mismatch: {} ids, {} index entries, {} adjacency lists",
                n,
                self.index.len(),
                self.adjacency.len()
            ));
        }

        let mut half_edges: Vec<(Slot, Slot, WorkSlot)> = Vec::with_capacity(self.edge_count * 2);
        for (slot, &artist) in self.ids.iter().enumerate() {
            if self.index.get(&artist).copied() != Some(slot as Slot) {
                return Err(format!("index does not map artist {} to slot {}", artist, slot));
            }

            let neighbors = &self.adjacency[slot];
            if neighbors.is_empty() {
                return Err(format!("artist {} has no collaborations", artist));
            }

            for &(neighbor, work) in neighbors {
                if neighbor as usize >= n || work as usize >= self.works.len() {
                    return Err(format!("artist {} has an out-of-range edge", artist));
                }
                if neighbor as usize == slot {
                    return Err(format!("artist {} has a self edge", artist));
                }
                let slot = slot as Slot;
                half_edges.push((slot.min(neighbor), slot.max(neighbor), work));
            }
        }

        if half_edges.len() != self.edge_count * 2 {
            return Err(format!(
                "edge count {} does not match {} adjacency entries",
                self.edge_count,
                half_edges.len()
            ));
        }

        half_edges.sort_unstable();
        for (i, pair) in half_edges.chunks(2).enumerate() {
            if pair.len() != 2 || pair[0] != pair[1] {
                return Err(format!("edge entry {} is not mirrored", i));
            }
            if i > 0 {
                let previous = half_edges[2 * i - 1];
                if (previous.0, previous.1) == (pair[0].0, pair[0].1) {
                    return Err(format!(
                        "artists {} and {} have more than one edge",
                        self.ids[pair[0].0 as usize], self.ids[pair[0].1 as usize]
                    ));
                }
            }
        }
        Ok(())
    }
}
