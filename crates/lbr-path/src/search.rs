//! Exhaustive simple-path enumeration over a topology snapshot
//!
//! Depth-first search with per-call backtracking state, so concurrent
//! searches over the same snapshot never share mutable data.

use crate::topology::{Link, TopologyGraph};
use lbr_common::DeviceId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered link sequence from source to destination device
pub type Route = Vec<Arc<Link>>;

/// Exploration bounds for pathological topologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimits {
    /// Longest route explored, in hops
    pub max_hops: usize,
    /// Stop after this many distinct routes
    pub max_paths: usize,
}

impl SearchLimits {
    /// No effective bound
    pub const UNBOUNDED: Self = Self {
        max_hops: usize::MAX,
        max_paths: usize::MAX,
    };
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_hops: 32,
            max_paths: 10_000,
        }
    }
}

/// Find every loop-free route from `src` to `dst`
///
/// Identical endpoints and devices missing from the snapshot yield no
/// routes. Results are unique by content and kept in discovery order.
pub fn find_all_routes(
    graph: &TopologyGraph,
    src: &DeviceId,
    dst: &DeviceId,
    limits: SearchLimits,
) -> Vec<Route> {
    if src == dst || !graph.contains(src) || !graph.contains(dst) || limits.max_hops == 0 {
        return Vec::new();
    }

    let mut search = Search {
        graph,
        dst,
        limits,
        visited: Vec::new(),
        links: Vec::new(),
        seen: HashSet::new(),
        routes: Vec::new(),
        truncated: false,
    };
    search.descend(src);

    if search.truncated {
        tracing::debug!(
            %src,
            %dst,
            found = search.routes.len(),
            max_paths = limits.max_paths,
            "route enumeration stopped at limit"
        );
    }
    search.routes
}

struct Search<'g> {
    graph: &'g TopologyGraph,
    dst: &'g DeviceId,
    limits: SearchLimits,
    /// Devices on the current branch
    visited: Vec<&'g DeviceId>,
    /// Links on the current branch
    links: Vec<Arc<Link>>,
    seen: HashSet<Route>,
    routes: Vec<Route>,
    truncated: bool,
}

impl<'g> Search<'g> {
    fn descend(&mut self, at: &'g DeviceId) {
        let graph = self.graph;
        self.visited.push(at);

        for egress in graph.edges_from(at) {
            if self.truncated {
                break;
            }
            let next = &egress.dst.device;

            if next == self.dst {
                self.links.push(Arc::clone(egress));
                self.record();
                self.links.pop();
            } else if !self.visited.contains(&next) && self.links.len() + 1 < self.limits.max_hops {
                self.links.push(Arc::clone(egress));
                self.descend(next);
                self.links.pop();
            }
        }

        self.visited.pop();
    }

    fn record(&mut self) {
        if self.seen.contains(&self.links) {
            return;
        }
        let route = self.links.clone();
        self.seen.insert(route.clone());
        self.routes.push(route);
        if self.routes.len() >= self.limits.max_paths {
            self.truncated = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::LinkState;
    use lbr_common::ConnectPoint;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn link(a: &str, b: &str) -> Link {
        Link::new(ConnectPoint::new(a, 1), ConnectPoint::new(b, 2))
    }

    fn diamond() -> TopologyGraph {
        TopologyGraph::from_links(
            [link("A", "B"), link("B", "D"), link("A", "C"), link("C", "D")],
        )
    }

    fn hops(route: &Route) -> Vec<(String, String)> {
        route
            .iter()
            .map(|l| (l.src.device.to_string(), l.dst.device.to_string()))
            .collect()
    }

    #[test]
    fn test_diamond_routes() {
        let routes = find_all_routes(&diamond(), &"A".into(), &"D".into(), SearchLimits::default());
        let found: BTreeSet<_> = routes.iter().map(hops).collect();

        let expected: BTreeSet<Vec<(String, String)>> = [
            vec![("A".into(), "B".into()), ("B".into(), "D".into())],
            vec![("A".into(), "C".into()), ("C".into(), "D".into())],
        ]
        .into_iter()
        .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_identical_endpoints() {
        let routes = find_all_routes(&diamond(), &"A".into(), &"A".into(), SearchLimits::default());
        assert!(routes.is_empty());
    }

    #[test]
    fn test_unknown_endpoint() {
        let routes = find_all_routes(&diamond(), &"A".into(), &"Z".into(), SearchLimits::default());
        assert!(routes.is_empty());
    }

    #[test]
    fn test_cycles_are_not_followed() {
        // A <-> B <-> C with a back edge C -> A
        let graph = TopologyGraph::from_links(
            [
                link("A", "B"),
                link("B", "A"),
                link("B", "C"),
                link("C", "B"),
                link("C", "A"),
            ],
        );
        let routes = find_all_routes(&graph, &"A".into(), &"C".into(), SearchLimits::default());
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].len(), 2);
    }

    #[test]
    fn test_enumerator_ignores_link_state() {
        let graph = TopologyGraph::from_links(
            [link("A", "B").with_state(LinkState::Inactive), link("B", "C")],
        );
        let routes = find_all_routes(&graph, &"A".into(), &"C".into(), SearchLimits::default());
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn test_parallel_links_are_distinct_routes() {
        let graph = TopologyGraph::from_links(
            [
                Link::new(ConnectPoint::new("A", 1), ConnectPoint::new("B", 1)),
                Link::new(ConnectPoint::new("A", 2), ConnectPoint::new("B", 2)),
            ],
        );
        let routes = find_all_routes(&graph, &"A".into(), &"B".into(), SearchLimits::default());
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn test_duplicate_links_collapse() {
        let graph = TopologyGraph::from_links([link("A", "B"), link("A", "B")]);
        let routes = find_all_routes(&graph, &"A".into(), &"B".into(), SearchLimits::default());
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn test_hop_limit() {
        // A-B-C-D chain plus a shortcut A-D
        let graph = TopologyGraph::from_links(
            [link("A", "B"), link("B", "C"), link("C", "D"), link("A", "D")],
        );
        let limits = SearchLimits {
            max_hops: 2,
            max_paths: usize::MAX,
        };
        let routes = find_all_routes(&graph, &"A".into(), &"D".into(), limits);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].len(), 1);

        let routes = find_all_routes(&graph, &"A".into(), &"D".into(), SearchLimits::UNBOUNDED);
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn test_path_limit() {
        let mut links = Vec::new();
        for mid in ["B", "C", "E", "F"] {
            links.push(link("A", mid));
            links.push(link(mid, "D"));
        }
        let graph = TopologyGraph::from_links(links);
        let limits = SearchLimits {
            max_hops: usize::MAX,
            max_paths: 2,
        };
        assert_eq!(find_all_routes(&graph, &"A".into(), &"D".into(), limits).len(), 2);
    }

    /// Reference enumeration: every vertex permutation prefix checked for edges
    fn brute_force(n: usize, edges: &[(usize, usize)], src: usize, dst: usize) -> BTreeSet<Vec<(usize, usize)>> {
        fn extend(
            path: &mut Vec<usize>,
            n: usize,
            edges: &[(usize, usize)],
            dst: usize,
            out: &mut BTreeSet<Vec<(usize, usize)>>,
        ) {
            let last = *path.last().unwrap();
            if last == dst && path.len() > 1 {
                out.insert(path.windows(2).map(|w| (w[0], w[1])).collect());
                return;
            }
            for v in 0..n {
                if path.contains(&v) || !edges.contains(&(last, v)) {
                    continue;
                }
                path.push(v);
                extend(path, n, edges, dst, out);
                path.pop();
            }
        }

        let mut out = BTreeSet::new();
        if src != dst {
            extend(&mut vec![src], n, edges, dst, &mut out);
        }
        out
    }

    proptest! {
        #[test]
        fn prop_matches_brute_force(
            n in 2usize..7,
            raw_edges in proptest::collection::vec((0usize..7, 0usize..7), 0..20),
            src in 0usize..7,
            dst in 0usize..7,
        ) {
            let src = src % n;
            let dst = dst % n;
            let edges: Vec<(usize, usize)> = raw_edges
                .into_iter()
                .map(|(a, b)| (a % n, b % n))
                .filter(|(a, b)| a != b)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let name = |i: usize| format!("v{i}");
            let graph = TopologyGraph::new(
                (0..n).map(|i| DeviceId::new(name(i))),
                edges.iter().map(|&(a, b)| link(&name(a), &name(b))),
            );

            let routes = find_all_routes(&graph, &name(src).into(), &name(dst).into(), SearchLimits::UNBOUNDED);
            let found: BTreeSet<Vec<(usize, usize)>> = routes
                .iter()
                .map(|r| {
                    r.iter()
                        .map(|l| {
                            let idx = |d: &DeviceId| d.as_str()[1..].parse::<usize>().unwrap();
                            (idx(&l.src.device), idx(&l.dst.device))
                        })
                        .collect()
                })
                .collect();

            prop_assert_eq!(found.len(), routes.len());
            prop_assert_eq!(found, brute_force(n, &edges, src, dst));
        }
    }
}
