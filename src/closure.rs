// SPDX-License-Identifier: MIT OR Apache-2.0

//! Materialised transitive closure of the group containment graph.
//!
//! One logical `(ancestor, descendant)` row exists for every pair of groups connected by a
//! nonempty path of direct edges, indexed in both directions for O(1) point lookup. The closure
//! is entirely derived state: [`build_closure`] recomputes it wholesale from the direct edges and
//! the store swaps it in atomically, so readers only ever observe a complete cache.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::group::GroupId;

/// The set of all `(ancestor, descendant)` pairs reachable through direct edges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitiveClosure {
    by_ancestor: HashMap<GroupId, HashSet<GroupId>>,
    by_descendant: HashMap<GroupId, HashSet<GroupId>>,
    pairs: usize,
}

impl TransitiveClosure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `ancestor` reaches `descendant`. Returns `true` when the pair was new.
    pub fn insert(&mut self, ancestor: GroupId, descendant: GroupId) -> bool {
        let inserted = self
            .by_ancestor
            .entry(ancestor)
            .or_default()
            .insert(descendant);
        if inserted {
            self.by_descendant
                .entry(descendant)
                .or_default()
                .insert(ancestor);
            self.pairs += 1;
        }
        inserted
    }

    /// True if `ancestor` reaches `descendant` through one or more direct edges.
    pub fn contains(&self, ancestor: GroupId, descendant: GroupId) -> bool {
        self.by_ancestor
            .get(&ancestor)
            .is_some_and(|descendants| descendants.contains(&descendant))
    }

    /// All groups which reach `descendant`. Unknown groups have no ancestors.
    pub fn ancestors_of(&self, descendant: GroupId) -> HashSet<GroupId> {
        self.by_descendant
            .get(&descendant)
            .cloned()
            .unwrap_or_default()
    }

    /// All groups reachable from `ancestor`. Unknown groups have no descendants.
    pub fn descendants_of(&self, ancestor: GroupId) -> HashSet<GroupId> {
        self.by_ancestor
            .get(&ancestor)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `(ancestor, descendant)` pairs.
    pub fn len(&self) -> usize {
        self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }
}

/// Compute the full transitive closure of the given direct-edge set.
///
/// Descendant sets are computed by depth-first traversal with global memoisation, so shared
/// subgraphs are walked once regardless of how many parents reach them. The traversal carries an
/// on-stack guard: edge sets are expected to be acyclic (insertion rejects cycles), but an
/// illegally cyclic input still terminates rather than recursing forever.
pub fn build_closure(edges: &[(GroupId, GroupId)]) -> TransitiveClosure {
    let mut children: HashMap<GroupId, BTreeSet<GroupId>> = HashMap::new();
    for (parent, child) in edges {
        children.entry(*parent).or_default().insert(*child);
    }

    let mut memo: HashMap<GroupId, HashSet<GroupId>> = HashMap::new();
    let mut closure = TransitiveClosure::new();
    for parent in children.keys().copied().collect::<Vec<_>>() {
        let mut stack = HashSet::new();
        for descendant in descendant_set(parent, &children, &mut memo, &mut stack) {
            closure.insert(parent, descendant);
        }
    }

    closure
}

/// descendants(g) = union over each direct child c of ({c} ∪ descendants(c)).
fn descendant_set(
    group: GroupId,
    children: &HashMap<GroupId, BTreeSet<GroupId>>,
    memo: &mut HashMap<GroupId, HashSet<GroupId>>,
    stack: &mut HashSet<GroupId>,
) -> HashSet<GroupId> {
    if let Some(known) = memo.get(&group) {
        return known.clone();
    }
    // Revisiting a group on the current path means a cycle; its contribution is already
    // accounted for higher up the stack.
    if !stack.insert(group) {
        return HashSet::new();
    }

    let mut descendants = HashSet::new();
    if let Some(direct) = children.get(&group) {
        for child in direct {
            descendants.insert(*child);
            descendants.extend(descendant_set(*child, children, memo, stack));
        }
    }

    stack.remove(&group);
    memo.insert(group, descendants.clone());
    descendants
}
