// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group records and identifiers.
//!
//! Groups are held in an arena keyed by [`GroupId`]; all relationships between groups and people
//! are plain id sets, never object references. Mutating a relationship edits the local sets of
//! the two endpoint records and nothing else: persistence, event emission and closure maintenance
//! are the resolver's job.

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identifier of a group.
///
/// Id 0 is reserved for the distinguished "anonymous" group which implicitly contains every
/// person.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl GroupId {
    /// The implicit "everyone" group. Every person, authenticated or not, is a member.
    pub const ANONYMOUS: GroupId = GroupId(0);
}

impl Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a person.
///
/// People are not modelled as records here; the engine only tracks which groups an id appears
/// in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonId(pub u64);

impl Display for PersonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A direct member of a group: a single person or another group.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Member {
    Person(PersonId),
    Group(GroupId),
}

impl Member {
    /// Return true if this member is itself a group.
    pub fn is_group(&self) -> bool {
        matches!(self, Member::Group(_))
    }

    /// Return true if this member is a single person.
    pub fn is_person(&self) -> bool {
        !self.is_group()
    }
}

/// A node in the membership graph.
///
/// Holds the direct person members, direct subgroups and the reverse edges (direct parents).
/// Two groups are equal iff their ids are equal. The `graph_changed` flag records that a
/// group-edge mutation occurred since the last closure rebuild; person-edge mutations never set
/// it since they do not affect the closure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    id: GroupId,
    name: Option<String>,
    members: BTreeSet<PersonId>,
    subgroups: BTreeSet<GroupId>,
    parents: BTreeSet<GroupId>,
    graph_changed: bool,
}

impl Group {
    /// Create an empty group.
    pub fn new(id: GroupId, name: Option<&str>) -> Self {
        Self {
            id,
            name: name.map(|name| name.to_string()),
            members: BTreeSet::new(),
            subgroups: BTreeSet::new(),
            parents: BTreeSet::new(),
            graph_changed: false,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Display name, if one was assigned.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Display name, falling back to a label derived from the id.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("group {}", self.id),
        }
    }

    /// Direct person members.
    pub fn members(&self) -> &BTreeSet<PersonId> {
        &self.members
    }

    /// Direct subgroups.
    pub fn subgroups(&self) -> &BTreeSet<GroupId> {
        &self.subgroups
    }

    /// Direct parent groups (inverse of `subgroups`).
    pub fn parents(&self) -> &BTreeSet<GroupId> {
        &self.parents
    }

    /// True if the group carries no direct memberships in any direction.
    pub fn is_severed(&self) -> bool {
        self.members.is_empty() && self.subgroups.is_empty() && self.parents.is_empty()
    }

    /// True if a group-edge mutation occurred since the last closure rebuild.
    pub fn graph_changed(&self) -> bool {
        self.graph_changed
    }

    pub fn set_graph_changed(&mut self) {
        self.graph_changed = true;
    }

    pub fn clear_graph_changed(&mut self) {
        self.graph_changed = false;
    }

    /// Add a person as a direct member. Returns `true` when the set changed.
    pub fn add_person_member(&mut self, person: PersonId) -> bool {
        self.members.insert(person)
    }

    /// Remove a direct person member. Returns `true` when the set changed.
    pub fn remove_person_member(&mut self, person: PersonId) -> bool {
        self.members.remove(&person)
    }

    /// Add a direct subgroup edge on the parent side. Returns `true` when the set changed.
    ///
    /// Self-loops are refused: a group is never its own direct subgroup.
    pub fn add_subgroup(&mut self, child: GroupId) -> bool {
        if child == self.id {
            return false;
        }
        let changed = self.subgroups.insert(child);
        if changed {
            self.graph_changed = true;
        }
        changed
    }

    /// Remove a direct subgroup edge on the parent side. Returns `true` when the set changed.
    pub fn remove_subgroup(&mut self, child: GroupId) -> bool {
        let changed = self.subgroups.remove(&child);
        if changed {
            self.graph_changed = true;
        }
        changed
    }

    /// Add a direct parent edge on the child side. Returns `true` when the set changed.
    pub fn add_parent(&mut self, parent: GroupId) -> bool {
        if parent == self.id {
            return false;
        }
        let changed = self.parents.insert(parent);
        if changed {
            self.graph_changed = true;
        }
        changed
    }

    /// Remove a direct parent edge on the child side. Returns `true` when the set changed.
    pub fn remove_parent(&mut self, parent: GroupId) -> bool {
        let changed = self.parents.remove(&parent);
        if changed {
            self.graph_changed = true;
        }
        changed
    }

    /// One-hop person containment.
    pub fn contains_person_direct(&self, person: PersonId) -> bool {
        self.members.contains(&person)
    }

    /// One-hop subgroup containment.
    pub fn contains_group_direct(&self, child: GroupId) -> bool {
        self.subgroups.contains(&child)
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Group {}

impl std::hash::Hash for Group {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
