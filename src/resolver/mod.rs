// SPDX-License-Identifier: MIT OR Apache-2.0

//! Membership resolution over the group hierarchy.
//!
//! The resolver owns the mutation surface for the membership graph and answers every membership
//! query from direct containment plus the closure cache. Group-edge mutations mark the graph as
//! changed; [`MembershipResolver::update`] observes the flag and rebuilds the cache, which is the
//! only dirty → consistent transition.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::closure::build_closure;
use crate::graph::would_cycle;
use crate::group::{Group, GroupId, Member, PersonId};
use crate::traits::{EventSink, GroupEvent, GroupStore, SessionContext};

#[cfg(test)]
mod tests;

#[derive(Debug, Error)]
pub enum GroupError<E>
where
    E: std::error::Error,
{
    #[error("storage error: {0}")]
    Store(E),

    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    #[error("group {0} cannot contain itself")]
    SelfReference(GroupId),

    #[error("adding group {child} to group {parent} would create a containment cycle")]
    CycleDetected { parent: GroupId, child: GroupId },

    #[error("group {0} still has direct membership relations")]
    GroupInUse(GroupId),

    #[error("group {0} is reserved and cannot be deleted")]
    ReservedGroup(GroupId),
}

/// Query and mutation surface for group membership.
///
/// The persistence store and event sink are injected on construction; the session context is
/// passed per call since it is scoped to the request being served.
#[derive(Clone, Debug)]
pub struct MembershipResolver<S, E> {
    store: S,
    events: E,
}

impl<S, E> MembershipResolver<S, E>
where
    S: GroupStore,
    E: EventSink,
{
    pub fn new(store: S, events: E) -> Self {
        Self { store, events }
    }

    /// Create an empty group.
    pub fn create_group(&mut self, name: Option<&str>) -> Result<Group, GroupError<S::Error>> {
        let group = self.store.create_group(name).map_err(GroupError::Store)?;
        debug!("created group {}", group.id());
        self.events.notify(GroupEvent::Created { group: group.id() });
        Ok(group)
    }

    /// Delete a group.
    ///
    /// All direct memberships, in both directions, must have been severed first. Deleting an
    /// unknown group is a no-op; the anonymous group cannot be deleted.
    pub fn delete_group(&mut self, id: GroupId) -> Result<bool, GroupError<S::Error>> {
        if id == GroupId::ANONYMOUS {
            return Err(GroupError::ReservedGroup(id));
        }
        let Some(group) = self.store.group(id).map_err(GroupError::Store)? else {
            return Ok(false);
        };
        if !group.is_severed() {
            return Err(GroupError::GroupInUse(id));
        }

        let removed = self.store.remove_group(id).map_err(GroupError::Store)?;
        if removed {
            debug!("deleted group {id}");
            self.events.notify(GroupEvent::Deleted { group: id });
        }
        Ok(removed)
    }

    /// Get a group record.
    pub fn group(&self, id: GroupId) -> Result<Option<Group>, GroupError<S::Error>> {
        self.store.group(id).map_err(GroupError::Store)
    }

    /// Look a group up by its display name.
    pub fn group_by_name(&self, name: &str) -> Result<Option<Group>, GroupError<S::Error>> {
        self.store.group_by_name(name).map_err(GroupError::Store)
    }

    /// Add a person as a direct member of a group.
    ///
    /// Idempotent: returns `Ok(false)` when the membership already existed. Person edges never
    /// affect the closure, so the graph is not marked as changed.
    pub fn add_person_member(
        &mut self,
        group: GroupId,
        person: PersonId,
    ) -> Result<bool, GroupError<S::Error>> {
        if self.store.group(group).map_err(GroupError::Store)?.is_none() {
            return Err(GroupError::GroupNotFound(group));
        }

        let changed = self
            .store
            .add_person_edge(group, person)
            .map_err(GroupError::Store)?;
        if changed {
            debug!("person {person} added to group {group}");
            self.events.notify(GroupEvent::MemberAdded {
                group,
                member: Member::Person(person),
            });
        }
        Ok(changed)
    }

    /// Remove a direct person membership. Removing a nonexistent edge is a no-op.
    pub fn remove_person_member(
        &mut self,
        group: GroupId,
        person: PersonId,
    ) -> Result<bool, GroupError<S::Error>> {
        let changed = self
            .store
            .remove_person_edge(group, person)
            .map_err(GroupError::Store)?;
        if changed {
            debug!("person {person} removed from group {group}");
            self.events.notify(GroupEvent::MemberRemoved {
                group,
                member: Member::Person(person),
            });
        }
        Ok(changed)
    }

    /// Add a group as a direct subgroup of another.
    ///
    /// Self-loops and edges which would close a containment cycle are rejected; the cycle check
    /// runs against the live direct edges so it stays correct for edges added since the last
    /// rebuild. A new edge updates both endpoint records and marks the graph as changed.
    pub fn add_group_member(
        &mut self,
        parent: GroupId,
        child: GroupId,
    ) -> Result<bool, GroupError<S::Error>> {
        if parent == child {
            return Err(GroupError::SelfReference(parent));
        }
        if self
            .store
            .group(parent)
            .map_err(GroupError::Store)?
            .is_none()
        {
            return Err(GroupError::GroupNotFound(parent));
        }
        if self
            .store
            .group(child)
            .map_err(GroupError::Store)?
            .is_none()
        {
            return Err(GroupError::GroupNotFound(child));
        }

        let edges = self.store.direct_edges().map_err(GroupError::Store)?;
        if would_cycle(&edges, parent, child) {
            warn!("rejected subgroup edge {parent} -> {child}: would create a containment cycle");
            return Err(GroupError::CycleDetected { parent, child });
        }

        let changed = self
            .store
            .add_group_edge(parent, child)
            .map_err(GroupError::Store)?;
        if changed {
            debug!("group {child} added as subgroup of group {parent}");
            self.events.notify(GroupEvent::MemberAdded {
                group: parent,
                member: Member::Group(child),
            });
        }
        Ok(changed)
    }

    /// Remove a direct subgroup edge. Removing a nonexistent edge is a no-op.
    pub fn remove_group_member(
        &mut self,
        parent: GroupId,
        child: GroupId,
    ) -> Result<bool, GroupError<S::Error>> {
        let changed = self
            .store
            .remove_group_edge(parent, child)
            .map_err(GroupError::Store)?;
        if changed {
            debug!("group {child} removed as subgroup of group {parent}");
            self.events.notify(GroupEvent::MemberRemoved {
                group: parent,
                member: Member::Group(child),
            });
        }
        Ok(changed)
    }

    /// Rebuild the closure cache if the given group saw a graph mutation since the last rebuild.
    pub fn update(&mut self, group: GroupId) -> Result<(), GroupError<S::Error>> {
        let Some(record) = self.store.group(group).map_err(GroupError::Store)? else {
            return Ok(());
        };
        if record.graph_changed() {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Unconditionally rebuild the closure cache from the current direct edges.
    ///
    /// The replacement is a single atomic swap, so concurrent readers never observe a partially
    /// rewritten cache. A storage failure propagates and leaves every graph-changed flag set;
    /// retry the whole rebuild, it cannot be resumed.
    pub fn rebuild(&mut self) -> Result<(), GroupError<S::Error>> {
        let edges = self.store.direct_edges().map_err(GroupError::Store)?;
        debug!("rebuilding transitive closure from {} direct edges", edges.len());

        let closure = build_closure(&edges);
        let pairs = closure.len();
        self.store
            .replace_closure(closure)
            .map_err(GroupError::Store)?;
        self.store
            .clear_graph_changed()
            .map_err(GroupError::Store)?;

        debug!("transitive closure rebuilt: {pairs} ancestor-descendant pairs");
        Ok(())
    }

    /// One-hop membership check. The anonymous group contains everybody.
    pub fn is_direct_member(
        &self,
        group: GroupId,
        person: PersonId,
    ) -> Result<bool, GroupError<S::Error>> {
        if group == GroupId::ANONYMOUS {
            return Ok(true);
        }
        Ok(self
            .store
            .group(group)
            .map_err(GroupError::Store)?
            .is_some_and(|group| group.contains_person_direct(person)))
    }

    /// One-hop subgroup check on the parent's direct subgroup set.
    pub fn is_direct_subgroup(
        &self,
        parent: GroupId,
        child: GroupId,
    ) -> Result<bool, GroupError<S::Error>> {
        Ok(self
            .store
            .group(parent)
            .map_err(GroupError::Store)?
            .is_some_and(|parent| parent.contains_group_direct(child)))
    }

    /// Every group the person belongs to, directly or transitively.
    ///
    /// Computed as the person's direct groups, plus the session's special groups, plus the
    /// anonymous group, plus the closure ancestors of everything collected so far — one indexed
    /// lookup per collected group, never a live graph walk.
    ///
    /// Special groups are attached to the session rather than to any stored person, so they are
    /// consulted **only** when `person` is the session's own authenticated identity. Resolving
    /// membership for anybody else deliberately skips them; they cannot be looked up for a third
    /// party.
    pub fn all_member_groups<C>(
        &self,
        session: &C,
        person: PersonId,
    ) -> Result<HashSet<GroupId>, GroupError<S::Error>>
    where
        C: SessionContext,
    {
        let mut groups = self.store.groups_of(person).map_err(GroupError::Store)?;
        if session.current_person() == Some(person) {
            groups.extend(session.special_groups());
        }
        groups.insert(GroupId::ANONYMOUS);
        self.with_ancestors(groups)
    }

    /// Every person belonging to the group or any of its subgroups, transitively.
    pub fn all_members(&self, group: GroupId) -> Result<HashSet<PersonId>, GroupError<S::Error>> {
        let mut groups = self.store.descendants(group).map_err(GroupError::Store)?;
        groups.insert(group);

        let mut members = HashSet::new();
        for id in groups {
            if let Some(record) = self.store.group(id).map_err(GroupError::Store)? {
                members.extend(record.members().iter().copied());
            }
        }
        Ok(members)
    }

    /// Resolve membership for the session's current identity.
    ///
    /// The anonymous group short-circuits to `true` without touching the graph. An
    /// unauthenticated session is a member of exactly its special groups, their closure
    /// ancestors and the anonymous group.
    pub fn is_member<C>(&self, session: &C, group: GroupId) -> Result<bool, GroupError<S::Error>>
    where
        C: SessionContext,
    {
        if group == GroupId::ANONYMOUS {
            return Ok(true);
        }
        match session.current_person() {
            Some(person) => Ok(self.all_member_groups(session, person)?.contains(&group)),
            None => Ok(self
                .with_ancestors(session.special_groups())?
                .contains(&group)),
        }
    }

    /// True iff the group has no direct person members and every subgroup is recursively empty.
    ///
    /// This is the one query which walks the live in-memory subgroup graph instead of the
    /// closure cache; the walk carries a visited set so it terminates on any input. An unknown
    /// group is empty.
    pub fn is_empty(&self, group: GroupId) -> Result<bool, GroupError<S::Error>> {
        let mut visited = HashSet::new();
        self.is_empty_inner(group, &mut visited)
    }

    fn is_empty_inner(
        &self,
        group: GroupId,
        visited: &mut HashSet<GroupId>,
    ) -> Result<bool, GroupError<S::Error>> {
        // A revisited group is already accounted for further up the walk.
        if !visited.insert(group) {
            return Ok(true);
        }
        let Some(record) = self.store.group(group).map_err(GroupError::Store)? else {
            return Ok(true);
        };
        if !record.members().is_empty() {
            return Ok(false);
        }
        for child in record.subgroups() {
            if !self.is_empty_inner(*child, visited)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn with_ancestors(
        &self,
        mut groups: HashSet<GroupId>,
    ) -> Result<HashSet<GroupId>, GroupError<S::Error>> {
        for group in groups.clone() {
            groups.extend(self.store.ancestors(group).map_err(GroupError::Store)?);
        }
        Ok(groups)
    }
}
