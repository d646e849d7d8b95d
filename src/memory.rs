// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for the group arena and closure cache.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::closure::TransitiveClosure;
use crate::group::{Group, GroupId, PersonId};
use crate::traits::GroupStore;

#[derive(Clone, Debug)]
struct InnerMemoryStore {
    groups: HashMap<GroupId, Group>,
    names: HashMap<String, GroupId>,
    person_index: HashMap<PersonId, HashSet<GroupId>>,
    closure: TransitiveClosure,
    next_id: u64,
}

/// An in-memory [`GroupStore`].
///
/// `MemoryGroupStore` supports usage in multi-threaded contexts by wrapping its state with an
/// `RwLock` and `Arc`. A closure replacement is a single value swap under the write lock, so
/// concurrent readers observe either the old or the new cache in full.
#[derive(Clone, Debug)]
pub struct MemoryGroupStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
}

impl MemoryGroupStore {
    /// Create a new store, seeded with the anonymous group.
    pub fn new() -> Self {
        let anonymous = Group::new(GroupId::ANONYMOUS, Some("anonymous"));
        let inner = InnerMemoryStore {
            names: HashMap::from([("anonymous".to_string(), GroupId::ANONYMOUS)]),
            groups: HashMap::from([(GroupId::ANONYMOUS, anonymous)]),
            person_index: HashMap::new(),
            closure: TransitiveClosure::new(),
            next_id: 1,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }
}

impl Default for MemoryGroupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupStore for MemoryGroupStore {
    type Error = Infallible;

    fn create_group(&mut self, name: Option<&str>) -> Result<Group, Self::Error> {
        let mut store = self.write_store();

        let id = GroupId(store.next_id);
        store.next_id += 1;

        let group = Group::new(id, name);
        if let Some(name) = name {
            store.names.insert(name.to_string(), id);
        }
        store.groups.insert(id, group.clone());

        Ok(group)
    }

    fn group(&self, id: GroupId) -> Result<Option<Group>, Self::Error> {
        Ok(self.read_store().groups.get(&id).cloned())
    }

    fn group_by_name(&self, name: &str) -> Result<Option<Group>, Self::Error> {
        let store = self.read_store();
        Ok(store
            .names
            .get(name)
            .and_then(|id| store.groups.get(id))
            .cloned())
    }

    fn remove_group(&mut self, id: GroupId) -> Result<bool, Self::Error> {
        let mut store = self.write_store();

        let Some(group) = store.groups.remove(&id) else {
            return Ok(false);
        };

        if let Some(name) = group.name() {
            if store.names.get(name) == Some(&id) {
                store.names.remove(name);
            }
        }
        for person in group.members() {
            if let Some(groups) = store.person_index.get_mut(person) {
                groups.remove(&id);
                if groups.is_empty() {
                    store.person_index.remove(person);
                }
            }
        }

        Ok(true)
    }

    fn add_person_edge(
        &mut self,
        group: GroupId,
        person: PersonId,
    ) -> Result<bool, Self::Error> {
        let mut store = self.write_store();

        let Some(record) = store.groups.get_mut(&group) else {
            return Ok(false);
        };
        let changed = record.add_person_member(person);
        if changed {
            store.person_index.entry(person).or_default().insert(group);
        }

        Ok(changed)
    }

    fn remove_person_edge(
        &mut self,
        group: GroupId,
        person: PersonId,
    ) -> Result<bool, Self::Error> {
        let mut store = self.write_store();

        let Some(record) = store.groups.get_mut(&group) else {
            return Ok(false);
        };
        let changed = record.remove_person_member(person);
        if changed {
            if let Some(groups) = store.person_index.get_mut(&person) {
                groups.remove(&group);
                if groups.is_empty() {
                    store.person_index.remove(&person);
                }
            }
        }

        Ok(changed)
    }

    fn add_group_edge(&mut self, parent: GroupId, child: GroupId) -> Result<bool, Self::Error> {
        let mut store = self.write_store();

        if !store.groups.contains_key(&child) {
            return Ok(false);
        }
        let Some(parent_record) = store.groups.get_mut(&parent) else {
            return Ok(false);
        };

        let changed = parent_record.add_subgroup(child);
        if changed {
            if let Some(child_record) = store.groups.get_mut(&child) {
                child_record.add_parent(parent);
            }
        }

        Ok(changed)
    }

    fn remove_group_edge(
        &mut self,
        parent: GroupId,
        child: GroupId,
    ) -> Result<bool, Self::Error> {
        let mut store = self.write_store();

        let Some(parent_record) = store.groups.get_mut(&parent) else {
            return Ok(false);
        };

        let changed = parent_record.remove_subgroup(child);
        if changed {
            if let Some(child_record) = store.groups.get_mut(&child) {
                child_record.remove_parent(parent);
            }
        }

        Ok(changed)
    }

    fn groups_of(&self, person: PersonId) -> Result<HashSet<GroupId>, Self::Error> {
        Ok(self
            .read_store()
            .person_index
            .get(&person)
            .cloned()
            .unwrap_or_default())
    }

    fn direct_edges(&self) -> Result<Vec<(GroupId, GroupId)>, Self::Error> {
        let store = self.read_store();
        let mut edges = Vec::new();
        for group in store.groups.values() {
            for child in group.subgroups() {
                edges.push((group.id(), *child));
            }
        }
        Ok(edges)
    }

    fn ancestors(&self, descendant: GroupId) -> Result<HashSet<GroupId>, Self::Error> {
        Ok(self.read_store().closure.ancestors_of(descendant))
    }

    fn descendants(&self, ancestor: GroupId) -> Result<HashSet<GroupId>, Self::Error> {
        Ok(self.read_store().closure.descendants_of(ancestor))
    }

    fn replace_closure(&mut self, closure: TransitiveClosure) -> Result<(), Self::Error> {
        self.write_store().closure = closure;
        Ok(())
    }

    fn clear_graph_changed(&mut self) -> Result<(), Self::Error> {
        for group in self.write_store().groups.values_mut() {
            group.clear_graph_changed();
        }
        Ok(())
    }
}
