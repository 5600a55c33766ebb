//! Cycle search over the sessions waiting for table locks.

use smallvec::SmallVec;
use tessera_data_structures::map::IntSet;
use tessera_primitives::SessionId;

/// The outcome of a deadlock check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadlockCheck {
    NoCycle,
    /// The sessions on the cycle, starting at the session that was checked
    /// and following wait-for edges.
    /// Empty if the checked session is the clash session itself.
    Cycle(Vec<SessionId>),
}

impl DeadlockCheck {
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle(_))
    }
}

/// Who waits for whom.
pub trait WaitForGraph {
    /// Returns the sessions holding the lock `session` currently waits for,
    /// or nothing if `session` is not waiting.
    fn blockers(&self, session: SessionId) -> SmallVec<[SessionId; 4]>;
}

/// Searches for a wait-for path from `session` back to `clash`.
///
/// A search starts with `clash = None`, meaning "does `session` wait on itself".
/// `visited` spans a whole search, so that no session is inspected twice
/// even when several engines contribute to the same search.
pub fn find_cycle(
    graph: &impl WaitForGraph,
    session: SessionId,
    clash: Option<SessionId>,
    visited: &mut IntSet<SessionId>,
) -> DeadlockCheck {
    let clash = match clash {
        None => session,
        Some(clash) if clash == session => return DeadlockCheck::Cycle(Vec::new()),
        Some(clash) => clash,
    };
    if !visited.insert(session) {
        return DeadlockCheck::NoCycle;
    }

    // Depth-first, with `path` holding the sessions from `session` down to the current node.
    let mut path = Vec::new();
    let mut stack = vec![(session, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        path.truncate(depth);
        path.push(node);
        for blocker in graph.blockers(node) {
            if blocker == node {
                continue;
            }
            if blocker == clash {
                return DeadlockCheck::Cycle(path);
            }
            if visited.insert(blocker) {
                stack.push((blocker, depth + 1));
            }
        }
    }
    DeadlockCheck::NoCycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_data_structures::map::{HashCollectionExt as _, IntMap};

    struct Graph(IntMap<SessionId, Vec<SessionId>>);

    impl Graph {
        fn new(edges: &[(u32, u32)]) -> Self {
            let mut map = IntMap::<SessionId, Vec<SessionId>>::new();
            for &(from, to) in edges {
                map.entry(SessionId(from)).or_default().push(SessionId(to));
            }
            Self(map)
        }
    }

    impl WaitForGraph for Graph {
        fn blockers(&self, session: SessionId) -> SmallVec<[SessionId; 4]> {
            self.0.get(&session).into_iter().flatten().copied().collect()
        }
    }

    fn check(graph: &Graph, session: u32) -> DeadlockCheck {
        find_cycle(graph, SessionId(session), None, &mut IntSet::new())
    }

    #[test]
    fn no_waits_no_cycle() {
        assert_eq!(check(&Graph::new(&[]), 1), DeadlockCheck::NoCycle);
    }

    #[test]
    fn chain_is_not_a_cycle() {
        let graph = Graph::new(&[(1, 2), (2, 3)]);
        assert_eq!(check(&graph, 1), DeadlockCheck::NoCycle);
    }

    #[test]
    fn two_sessions_waiting_on_each_other() {
        let graph = Graph::new(&[(1, 2), (2, 1)]);
        assert_eq!(check(&graph, 1), DeadlockCheck::Cycle(vec![SessionId(1), SessionId(2)]));
    }

    #[test]
    fn cycle_found_behind_a_branch() {
        let graph = Graph::new(&[(1, 4), (1, 2), (2, 3), (3, 1), (4, 5)]);
        assert_eq!(
            check(&graph, 1),
            DeadlockCheck::Cycle(vec![SessionId(1), SessionId(2), SessionId(3)])
        );
    }

    #[test]
    fn cycle_not_through_start_is_ignored() {
        // 2 and 3 deadlock each other, but 1 is merely stuck behind them.
        let graph = Graph::new(&[(1, 2), (2, 3), (3, 2)]);
        assert_eq!(check(&graph, 1), DeadlockCheck::NoCycle);
    }

    #[test]
    fn session_equal_to_clash_closes_cycle() {
        let graph = Graph::new(&[]);
        let mut visited = IntSet::new();
        let found = find_cycle(&graph, SessionId(7), Some(SessionId(7)), &mut visited);
        assert_eq!(found, DeadlockCheck::Cycle(Vec::new()));
    }

    #[test]
    fn visited_session_is_not_rechecked() {
        let graph = Graph::new(&[(1, 2), (2, 1)]);
        let mut visited = IntSet::new();
        visited.insert(SessionId(2));
        let found = find_cycle(&graph, SessionId(2), Some(SessionId(1)), &mut visited);
        assert_eq!(found, DeadlockCheck::NoCycle);
    }
}
