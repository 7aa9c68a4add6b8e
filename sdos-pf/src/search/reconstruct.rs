//! Path reconstruction from bidirectional parent maps

use std::collections::HashMap;
use std::hash::Hash;

/// Visited map of one search side: node -> (parent, work linking node and parent)
///
/// The side's own root maps to `(None, None)`.
pub type ParentMap<N, W> = HashMap<N, (Option<N>, Option<W>)>;

/// Join the two half-paths that meet at `meeting`
///
/// On the source side each entry points back toward the source, so the walk
/// is collected and reversed; the source itself is never emitted. On the
/// target side the *parent* is the next hop, paired with the work linking it
/// to the node being left. The last element is always the target root.
pub fn reconstruct<N, W>(
    meeting: N,
    from_source: &ParentMap<N, W>,
    from_target: &ParentMap<N, W>,
) -> Vec<(N, Option<W>)>
where
    N: Copy + Eq + Hash,
    W: Clone,
{
    let mut path = Vec::new();

    let mut current = meeting;
    while let Some((Some(parent), work)) = from_source.get(&current) {
        path.push((current, work.clone()));
        current = *parent;
    }
    path.reverse();

    let mut current = meeting;
    while let Some((Some(parent), work)) = from_target.get(&current) {
        path.push((*parent, work.clone()));
        current = *parent;
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    type Map = ParentMap<u32, &'static str>;

    #[test]
    fn test_target_side_uses_parent_as_next_hop() {
        // 1 -a- 2 -b- 3 -c- 4, source 1, target 4, meeting at 2
        let from_source: Map = HashMap::from([(1, (None, None)), (2, (Some(1), Some("a")))]);
        let from_target: Map = HashMap::from([
            (4, (None, None)),
            (3, (Some(4), Some("c"))),
            (2, (Some(3), Some("b"))),
        ]);

        let path = reconstruct(2, &from_source, &from_target);
        assert_eq!(path, vec![(2, Some("a")), (3, Some("b")), (4, Some("c"))]);
    }

    #[test]
    fn test_meeting_at_target() {
        let from_source: Map = HashMap::from([
            (1, (None, None)),
            (2, (Some(1), Some("a"))),
            (3, (Some(2), Some("b"))),
        ]);
        let from_target: Map = HashMap::from([(3, (None, None))]);

        let path = reconstruct(3, &from_source, &from_target);
        assert_eq!(path, vec![(2, Some("a")), (3, Some("b"))]);
    }

    #[test]
    fn test_meeting_at_source_walks_target_side_only() {
        let from_source: Map = HashMap::from([(1, (None, None))]);
        let from_target: Map = HashMap::from([
            (3, (None, None)),
            (2, (Some(3), Some("b"))),
            (1, (Some(2), Some("a"))),
        ]);

        let path = reconstruct(1, &from_source, &from_target);
        assert_eq!(path, vec![(2, Some("a")), (3, Some("b"))]);
    }
}
