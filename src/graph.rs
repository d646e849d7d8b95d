// SPDX-License-Identifier: MIT OR Apache-2.0

//! Traversal helpers over the direct-edge graph.
//!
//! Edges run from parent to child: `(a, b)` means group `a` directly contains group `b`.

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;

use crate::group::GroupId;

/// Build a directed graph from the stored direct-edge list.
pub fn edge_graph(edges: &[(GroupId, GroupId)]) -> DiGraphMap<GroupId, ()> {
    let mut graph = DiGraphMap::new();
    for (parent, child) in edges {
        graph.add_edge(*parent, *child, ());
    }
    graph
}

/// Return `true` if a directed path exists in the graph between `from` and `to`.
///
/// A node reaches itself, provided it appears in the graph at all.
pub fn has_path(graph: &DiGraphMap<GroupId, ()>, from: GroupId, to: GroupId) -> bool {
    if !graph.contains_node(from) {
        return false;
    }
    let mut dfs = Dfs::new(graph, from);
    while let Some(node) = dfs.next(graph) {
        if node == to {
            return true;
        }
    }
    false
}

/// Return `true` if inserting the direct edge `(parent, child)` would close a containment cycle.
///
/// The check runs against the live direct edges rather than the closure cache, so it stays
/// correct for edges added since the last rebuild.
pub fn would_cycle(edges: &[(GroupId, GroupId)], parent: GroupId, child: GroupId) -> bool {
    if parent == child {
        return true;
    }
    has_path(&edge_graph(edges), child, parent)
}
