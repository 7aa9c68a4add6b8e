//! Shortest collaboration path search
//!
//! Bidirectional breadth-first search over the graph's dense slots. Each round
//! expands one full level of the smaller frontier (the source side on a tie).
//! A neighbor is checked against the other side only when it is newly visited
//! on the expanding side, and the first such hit is the meeting point. Ties
//! between equally short paths follow adjacency order.

use sdos_common::ArtistId;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::graph::{CollaborationGraph, Slot, WorkSlot};

pub mod reconstruct;

pub use reconstruct::{reconstruct, ParentMap};

/// One step of a path: the artist reached and the recording that links it to
/// the previous artist (`None` only for a same-artist query)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub artist: ArtistId,
    pub work: Option<String>,
}

impl Hop {
    pub fn new(artist: ArtistId, work: Option<&str>) -> Self {
        Self {
            artist,
            work: work.map(str::to_string),
        }
    }
}

/// Hops from source (exclusive) to target (inclusive)
pub type Path = Vec<Hop>;

/// Unordered artist pairs a single search treats as absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedEdges {
    pairs: HashSet<(ArtistId, ArtistId)>,
}

impl ExcludedEdges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw id lists, ignoring entries with fewer than two ids
    ///
    /// Only the first two ids of a longer entry are used.
    pub fn from_lists<L: AsRef<[ArtistId]>>(lists: &[L]) -> Self {
        lists
            .iter()
            .filter_map(|list| match list.as_ref() {
                [a, b, ..] => Some((*a, *b)),
                _ => None,
            })
            .collect()
    }

    pub fn insert(&mut self, a: ArtistId, b: ArtistId) {
        self.pairs.insert(normalize(a, b));
    }

    pub fn contains(&self, a: ArtistId, b: ArtistId) -> bool {
        self.pairs.contains(&normalize(a, b))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Translate to slot pairs, dropping pairs with an artist outside the graph
    fn to_slots(&self, graph: &CollaborationGraph) -> HashSet<(Slot, Slot)> {
        self.pairs
            .iter()
            .filter_map(|&(a, b)| Some(normalize(graph.slot(a)?, graph.slot(b)?)))
            .collect()
    }
}

impl FromIterator<(ArtistId, ArtistId)> for ExcludedEdges {
    fn from_iter<I: IntoIterator<Item = (ArtistId, ArtistId)>>(iter: I) -> Self {
        let mut excluded = Self::new();
        for (a, b) in iter {
            excluded.insert(a, b);
        }
        excluded
    }
}

fn normalize<T: Ord>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Bounds on a single search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    /// Maximum number of artists expanded across both sides
    pub max_expansions: Option<usize>,
}

impl SearchLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// Work done by a single search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub expanded: usize,
    pub visited_source: usize,
    pub visited_target: usize,
}

/// Shortest path between two artists, `None` when they are not connected
///
/// Artists missing from the graph are reported as not connected.
pub fn find_path(
    graph: &CollaborationGraph,
    source: ArtistId,
    target: ArtistId,
    excluded: &ExcludedEdges,
) -> Option<Path> {
    find_path_with_limits(graph, source, target, excluded, SearchLimits::unbounded())
        .ok()
        .and_then(|(path, _)| path)
}

/// Shortest path search with a node-expansion budget
///
/// Fails with [`Error::EntityNotInGraph`] when an endpoint has no
/// collaborations and with [`Error::SearchExhausted`] when the budget runs
/// out. "No path" is `Ok((None, _))`.
pub fn find_path_with_limits(
    graph: &CollaborationGraph,
    source: ArtistId,
    target: ArtistId,
    excluded: &ExcludedEdges,
    limits: SearchLimits,
) -> Result<(Option<Path>, SearchStats)> {
    let (source_slot, target_slot) = match (graph.slot(source), graph.slot(target)) {
        (Some(s), Some(t)) => (s, t),
        (s, t) => {
            let mut missing = Vec::new();
            if s.is_none() {
                missing.push(source);
            }
            if t.is_none() && target != source {
                missing.push(target);
            }
            return Err(Error::EntityNotInGraph { missing });
        }
    };

    let mut stats = SearchStats::default();
    if source_slot == target_slot {
        return Ok((Some(vec![Hop::new(target, None)]), stats));
    }

    let excluded = excluded.to_slots(graph);
    let mut from_source: ParentMap<Slot, WorkSlot> = HashMap::from([(source_slot, (None, None))]);
    let mut from_target: ParentMap<Slot, WorkSlot> = HashMap::from([(target_slot, (None, None))]);
    let mut source_frontier = vec![source_slot];
    let mut target_frontier = vec![target_slot];
    let mut meeting = None;

    while meeting.is_none() && !source_frontier.is_empty() && !target_frontier.is_empty() {
        let mut side = if source_frontier.len() <= target_frontier.len() {
            Side {
                frontier: &mut source_frontier,
                visited: &mut from_source,
                other: &from_target,
            }
        } else {
            Side {
                frontier: &mut target_frontier,
                visited: &mut from_target,
                other: &from_source,
            }
        };
        meeting = side.expand_level(graph, &excluded, &mut stats.expanded, limits)?;
    }

    stats.visited_source = from_source.len();
    stats.visited_target = from_target.len();

    let path = meeting.map(|meeting| {
        reconstruct(meeting, &from_source, &from_target)
            .into_iter()
            .map(|(slot, work)| Hop {
                artist: graph.artist_at(slot),
                work: work.map(|w| graph.work_title(w).to_string()),
            })
            .collect()
    });
    Ok((path, stats))
}

/// The half of the search being expanded this round
struct Side<'a> {
    frontier: &'a mut Vec<Slot>,
    visited: &'a mut ParentMap<Slot, WorkSlot>,
    other: &'a ParentMap<Slot, WorkSlot>,
}

impl Side<'_> {
    /// Expand every node of the frontier by one level, returning the meeting point if found
    fn expand_level(
        &mut self,
        graph: &CollaborationGraph,
        excluded: &HashSet<(Slot, Slot)>,
        expanded: &mut usize,
        limits: SearchLimits,
    ) -> Result<Option<Slot>> {
        let mut next = Vec::new();

        for &current in self.frontier.iter() {
            if let Some(max) = limits.max_expansions {
                if *expanded >= max {
                    return Err(Error::SearchExhausted {
                        expanded: *expanded,
                    });
                }
            }
            *expanded += 1;

            for &(neighbor, work) in graph.slot_neighbors(current) {
                if !excluded.is_empty() && excluded.contains(&normalize(current, neighbor)) {
                    continue;
                }
                if let Entry::Vacant(entry) = self.visited.entry(neighbor) {
                    entry.insert((Some(current), Some(work)));
                    if self.other.contains_key(&neighbor) {
                        return Ok(Some(neighbor));
                    }
                    next.push(neighbor);
                }
            }
        }

        *self.frontier = next;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_from_records;
    use sdos_common::CollaborationRecord;

    fn graph(edges: &[(ArtistId, ArtistId, &str)]) -> CollaborationGraph {
        build_from_records(
            edges
                .iter()
                .enumerate()
                .map(|(i, &(a, b, w))| CollaborationRecord::new(i as i64, w, vec![a, b])),
            false,
        )
    }

    fn triangle() -> CollaborationGraph {
        graph(&[(10, 20, "SongA"), (20, 30, "SongB"), (10, 30, "SongC")])
    }

    #[test]
    fn test_same_artist_is_trivial_path() {
        let path = find_path(&triangle(), 20, 20, &ExcludedEdges::new()).unwrap();
        assert_eq!(path, vec![Hop::new(20, None)]);
    }

    #[test]
    fn test_direct_edge() {
        let path = find_path(&triangle(), 10, 30, &ExcludedEdges::new()).unwrap();
        assert_eq!(path, vec![Hop::new(30, Some("SongC"))]);
    }

    #[test]
    fn test_excluded_edge_forces_detour() {
        let excluded: ExcludedEdges = [(30, 10)].into_iter().collect();
        let path = find_path(&triangle(), 10, 30, &excluded).unwrap();
        assert_eq!(
            path,
            vec![Hop::new(20, Some("SongA")), Hop::new(30, Some("SongB"))]
        );
    }

    #[test]
    fn test_excluding_every_route_means_no_path() {
        let excluded: ExcludedEdges = [(10, 30), (20, 30)].into_iter().collect();
        assert!(find_path(&triangle(), 10, 30, &excluded).is_none());
    }

    #[test]
    fn test_disconnected_components() {
        let g = graph(&[(1, 2, "A"), (3, 4, "B")]);
        let (path, stats) =
            find_path_with_limits(&g, 1, 4, &ExcludedEdges::new(), SearchLimits::unbounded())
                .unwrap();
        assert!(path.is_none());
        assert!(stats.expanded >= 1);
    }

    #[test]
    fn test_long_chain_meets_in_the_middle() {
        let g = graph(&[
            (1, 2, "a"),
            (2, 3, "b"),
            (3, 4, "c"),
            (4, 5, "d"),
            (5, 6, "e"),
        ]);
        let path = find_path(&g, 1, 6, &ExcludedEdges::new()).unwrap();
        let artists: Vec<ArtistId> = path.iter().map(|h| h.artist).collect();
        let works: Vec<&str> = path.iter().filter_map(|h| h.work.as_deref()).collect();

        assert_eq!(artists, vec![2, 3, 4, 5, 6]);
        assert_eq!(works, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_reverse_query_uses_same_works() {
        let g = graph(&[(1, 2, "a"), (2, 3, "b"), (3, 4, "c")]);
        let forward = find_path(&g, 1, 4, &ExcludedEdges::new()).unwrap();
        let backward = find_path(&g, 4, 1, &ExcludedEdges::new()).unwrap();

        assert_eq!(forward.len(), backward.len());
        assert_eq!(backward.last().unwrap().artist, 1);
        assert_eq!(backward[0], Hop::new(3, Some("c")));
    }

    #[test]
    fn test_missing_endpoints_reported() {
        let err = find_path_with_limits(
            &triangle(),
            99,
            98,
            &ExcludedEdges::new(),
            SearchLimits::unbounded(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::EntityNotInGraph { ref missing } if missing == &vec![99, 98]));

        let err = find_path_with_limits(
            &triangle(),
            10,
            98,
            &ExcludedEdges::new(),
            SearchLimits::unbounded(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::EntityNotInGraph { ref missing } if missing == &vec![98]));
    }

    #[test]
    fn test_expansion_budget() {
        let g = graph(&[(1, 2, "a"), (2, 3, "b"), (3, 4, "c"), (4, 5, "d")]);
        let limits = SearchLimits {
            max_expansions: Some(1),
        };
        let err = find_path_with_limits(&g, 1, 5, &ExcludedEdges::new(), limits).unwrap_err();
        assert!(matches!(err, Error::SearchExhausted { expanded: 1 }));

        let roomy = SearchLimits {
            max_expansions: Some(100),
        };
        let (path, stats) = find_path_with_limits(&g, 1, 5, &ExcludedEdges::new(), roomy).unwrap();
        assert_eq!(path.unwrap().len(), 4);
        assert!(stats.expanded <= 100);
    }

    #[test]
    fn test_excluded_edges_from_lists() {
        let excluded = ExcludedEdges::from_lists(&[vec![1, 2], vec![3], vec![], vec![5, 4, 9]]);
        assert_eq!(excluded.len(), 2);
        assert!(excluded.contains(2, 1));
        assert!(excluded.contains(4, 5));
        assert!(!excluded.contains(4, 9));
    }
}
