// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;
use std::error::Error;

use crate::closure::TransitiveClosure;
use crate::group::{Group, GroupId, PersonId};

/// Persistence interface for group records, direct edges and the closure cache.
///
/// Implementations must seed the distinguished anonymous group ([`GroupId::ANONYMOUS`]) so that
/// it is always present. Edge mutations return whether anything actually changed; applying an
/// edge that already exists (or removing one that doesn't) is a no-op, and edge operations on
/// unknown groups change nothing.
pub trait GroupStore {
    type Error: Error;

    /// Create an empty group under a freshly allocated id.
    fn create_group(&mut self, name: Option<&str>) -> Result<Group, Self::Error>;

    /// Get a group record.
    fn group(&self, id: GroupId) -> Result<Option<Group>, Self::Error>;

    /// Look a group up by its display name.
    fn group_by_name(&self, name: &str) -> Result<Option<Group>, Self::Error>;

    /// Delete a group record.
    ///
    /// Returns `true` when the removal occurred and `false` when the group was not found. The
    /// caller is responsible for severing all direct memberships first.
    fn remove_group(&mut self, id: GroupId) -> Result<bool, Self::Error>;

    /// Add a direct person membership. Returns `true` when the edge was new.
    fn add_person_edge(&mut self, group: GroupId, person: PersonId)
    -> Result<bool, Self::Error>;

    /// Remove a direct person membership. Returns `true` when an edge was removed.
    fn remove_person_edge(
        &mut self,
        group: GroupId,
        person: PersonId,
    ) -> Result<bool, Self::Error>;

    /// Add a direct subgroup edge, updating both endpoint records. Returns `true` when the edge
    /// was new.
    fn add_group_edge(&mut self, parent: GroupId, child: GroupId) -> Result<bool, Self::Error>;

    /// Remove a direct subgroup edge from both endpoint records. Returns `true` when an edge was
    /// removed.
    fn remove_group_edge(&mut self, parent: GroupId, child: GroupId)
    -> Result<bool, Self::Error>;

    /// All groups the person is a direct member of (membership index keyed by person).
    fn groups_of(&self, person: PersonId) -> Result<HashSet<GroupId>, Self::Error>;

    /// The complete direct-edge set as `(parent, child)` pairs.
    fn direct_edges(&self) -> Result<Vec<(GroupId, GroupId)>, Self::Error>;

    /// Closure point lookup keyed by descendant: every group which transitively contains the
    /// given one.
    fn ancestors(&self, descendant: GroupId) -> Result<HashSet<GroupId>, Self::Error>;

    /// Closure point lookup keyed by ancestor: every group the given one transitively contains.
    fn descendants(&self, ancestor: GroupId) -> Result<HashSet<GroupId>, Self::Error>;

    /// Replace the entire closure cache in one atomic swap.
    ///
    /// Readers concurrent with the swap observe either the previous or the new closure, never a
    /// partially rewritten one. On failure the old cache contents are unspecified and the caller
    /// must retry the whole rebuild.
    fn replace_closure(&mut self, closure: TransitiveClosure) -> Result<(), Self::Error>;

    /// Clear the graph-changed flag on every group after a successful rebuild.
    fn clear_graph_changed(&mut self) -> Result<(), Self::Error>;
}
