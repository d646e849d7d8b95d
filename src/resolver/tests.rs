// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::closure::TransitiveClosure;
use crate::group::{GroupId, Member, PersonId};
use crate::memory::MemoryGroupStore;
use crate::resolver::{GroupError, MembershipResolver};
use crate::test_utils::{RecordingSink, TestSession, setup_logging};
use crate::traits::{GroupEvent, GroupStore};

type TestResolver = MembershipResolver<MemoryGroupStore, RecordingSink>;

fn resolver() -> (TestResolver, RecordingSink) {
    setup_logging();
    let sink = RecordingSink::default();
    let resolver = MembershipResolver::new(MemoryGroupStore::new(), sink.clone());
    (resolver, sink)
}

#[test]
fn three_level_chain() {
    let (mut resolver, _) = resolver();

    // Create groups A, B, C; nest C under B under A; add person X to C only.
    let a = resolver.create_group(Some("a")).unwrap().id();
    let b = resolver.create_group(Some("b")).unwrap().id();
    let c = resolver.create_group(Some("c")).unwrap().id();
    let x = PersonId(100);

    assert!(resolver.add_group_member(a, b).unwrap());
    assert!(resolver.add_group_member(b, c).unwrap());
    assert!(resolver.add_person_member(c, x).unwrap());
    resolver.update(a).unwrap();

    assert!(!resolver.is_direct_member(a, x).unwrap());
    assert!(resolver.is_direct_member(c, x).unwrap());
    assert!(resolver.is_direct_subgroup(a, b).unwrap());
    assert!(!resolver.is_direct_subgroup(a, c).unwrap());

    let session = TestSession::authenticated(x);
    let groups = resolver.all_member_groups(&session, x).unwrap();
    for expected in [a, b, c, GroupId::ANONYMOUS] {
        assert!(groups.contains(&expected));
    }

    assert!(resolver.all_members(a).unwrap().contains(&x));
    assert!(resolver.is_member(&session, a).unwrap());

    // Severing B -> C cuts X loose from A and B after the next rebuild.
    assert!(resolver.remove_group_member(b, c).unwrap());
    resolver.update(b).unwrap();

    let groups = resolver.all_member_groups(&session, x).unwrap();
    assert!(!groups.contains(&a));
    assert!(!groups.contains(&b));
    assert!(groups.contains(&c));
    assert!(groups.contains(&GroupId::ANONYMOUS));
    assert!(!resolver.all_members(a).unwrap().contains(&x));
}

#[test]
fn anonymous_universality() {
    let (mut resolver, _) = resolver();
    let staff = resolver.create_group(Some("staff")).unwrap().id();
    let stranger = PersonId(7);

    // Without any stored membership at all.
    assert!(resolver.is_direct_member(GroupId::ANONYMOUS, stranger).unwrap());
    assert!(
        resolver
            .all_member_groups(&TestSession::authenticated(stranger), stranger)
            .unwrap()
            .contains(&GroupId::ANONYMOUS)
    );

    // The unauthenticated session is still in the anonymous group, and the check never touches
    // the graph.
    let anonymous_session = TestSession::anonymous();
    assert!(resolver.is_member(&anonymous_session, GroupId::ANONYMOUS).unwrap());
    assert!(!resolver.is_member(&anonymous_session, staff).unwrap());

    // Third-party resolution also always carries the anonymous group.
    let session = TestSession::authenticated(PersonId(1));
    assert!(
        resolver
            .all_member_groups(&session, stranger)
            .unwrap()
            .contains(&GroupId::ANONYMOUS)
    );
}

#[test]
fn special_groups_apply_to_the_own_identity_only() {
    let (mut resolver, _) = resolver();

    let vault = resolver.create_group(Some("vault")).unwrap().id();
    let wing = resolver.create_group(Some("wing")).unwrap().id();
    assert!(resolver.add_group_member(vault, wing).unwrap());
    resolver.update(vault).unwrap();

    let me = PersonId(1);
    let other = PersonId(2);
    let session = TestSession::authenticated(me).with_special_groups([wing]);

    // The session's own identity picks up the special group and its ancestors.
    let own = resolver.all_member_groups(&session, me).unwrap();
    assert!(own.contains(&wing));
    assert!(own.contains(&vault));
    assert!(resolver.is_member(&session, vault).unwrap());

    // Resolving a different person through the same session skips special groups entirely.
    let theirs = resolver.all_member_groups(&session, other).unwrap();
    assert!(!theirs.contains(&wing));
    assert!(!theirs.contains(&vault));

    // An unauthenticated session with special groups is in them and their ancestors.
    let gate_session = TestSession::anonymous().with_special_groups([wing]);
    assert!(resolver.is_member(&gate_session, wing).unwrap());
    assert!(resolver.is_member(&gate_session, vault).unwrap());
    assert!(!resolver.is_member(&gate_session, GroupId(999)).unwrap());
}

#[test]
fn mutations_are_idempotent() {
    let (mut resolver, sink) = resolver();

    let a = resolver.create_group(Some("a")).unwrap().id();
    let b = resolver.create_group(Some("b")).unwrap().id();
    let x = PersonId(5);

    assert!(resolver.add_group_member(a, b).unwrap());
    assert!(!resolver.add_group_member(a, b).unwrap());
    assert!(resolver.add_person_member(b, x).unwrap());
    assert!(!resolver.add_person_member(b, x).unwrap());

    // Exactly one event per actual change.
    let member_events: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|event| matches!(event, GroupEvent::MemberAdded { .. }))
        .collect();
    assert_eq!(
        member_events,
        vec![
            GroupEvent::MemberAdded {
                group: a,
                member: Member::Group(b),
            },
            GroupEvent::MemberAdded {
                group: b,
                member: Member::Person(x),
            },
        ]
    );

    // The duplicate adds left a single edge and a rebuild stays correct.
    resolver.update(a).unwrap();
    let session = TestSession::authenticated(x);
    assert!(resolver.all_member_groups(&session, x).unwrap().contains(&a));
    assert!(resolver.all_members(a).unwrap().contains(&x));

    assert!(resolver.remove_person_member(b, x).unwrap());
    assert!(!resolver.remove_person_member(b, x).unwrap());
    assert!(resolver.remove_group_member(a, b).unwrap());
    assert!(!resolver.remove_group_member(a, b).unwrap());
}

#[test]
fn membership_is_monotone_under_edge_changes() {
    let (mut resolver, _) = resolver();

    let root = resolver.create_group(Some("root")).unwrap().id();
    let mid = resolver.create_group(Some("mid")).unwrap().id();
    let leaf = resolver.create_group(Some("leaf")).unwrap().id();
    let x = PersonId(3);

    resolver.add_group_member(mid, leaf).unwrap();
    resolver.add_person_member(leaf, x).unwrap();
    resolver.update(mid).unwrap();

    let session = TestSession::authenticated(x);
    let before = resolver.all_member_groups(&session, x).unwrap();

    // Adding an edge only ever adds facts.
    resolver.add_group_member(root, mid).unwrap();
    resolver.update(root).unwrap();
    let grown = resolver.all_member_groups(&session, x).unwrap();
    assert!(grown.is_superset(&before));
    assert!(grown.contains(&root));

    // Removing it only ever removes facts.
    resolver.remove_group_member(root, mid).unwrap();
    resolver.update(root).unwrap();
    let shrunk = resolver.all_member_groups(&session, x).unwrap();
    assert!(shrunk.is_subset(&grown));
    assert_eq!(shrunk, before);
}

#[test]
fn cycle_edges_are_rejected() {
    let (mut resolver, _) = resolver();

    let a = resolver.create_group(Some("a")).unwrap().id();
    let b = resolver.create_group(Some("b")).unwrap().id();
    let c = resolver.create_group(Some("c")).unwrap().id();
    resolver.add_group_member(a, b).unwrap();
    resolver.add_group_member(b, c).unwrap();

    assert!(matches!(
        resolver.add_group_member(a, a),
        Err(GroupError::SelfReference(id)) if id == a
    ));
    assert!(matches!(
        resolver.add_group_member(c, a),
        Err(GroupError::CycleDetected { parent, child }) if parent == c && child == a
    ));
    // The rejected edges left no trace.
    assert!(!resolver.is_direct_subgroup(c, a).unwrap());

    // A diamond is not a cycle.
    assert!(resolver.add_group_member(a, c).unwrap());
}

#[test]
fn unknown_references() {
    let (mut resolver, _) = resolver();
    let ghost = GroupId(404);
    let x = PersonId(9);

    // Additive mutations on unknown groups are errors.
    assert!(matches!(
        resolver.add_person_member(ghost, x),
        Err(GroupError::GroupNotFound(id)) if id == ghost
    ));
    let real = resolver.create_group(Some("real")).unwrap().id();
    assert!(matches!(
        resolver.add_group_member(real, ghost),
        Err(GroupError::GroupNotFound(id)) if id == ghost
    ));

    // Removals are idempotent no-ops, queries resolve empty.
    assert!(!resolver.remove_person_member(ghost, x).unwrap());
    assert!(!resolver.remove_group_member(ghost, real).unwrap());
    assert!(!resolver.is_direct_member(ghost, x).unwrap());
    assert!(resolver.all_members(ghost).unwrap().is_empty());
    assert!(resolver.is_empty(ghost).unwrap());
    assert!(resolver.group(ghost).unwrap().is_none());

    let session = TestSession::authenticated(x);
    assert_eq!(
        resolver.all_member_groups(&session, x).unwrap(),
        [GroupId::ANONYMOUS].into_iter().collect()
    );
}

#[test]
fn group_lifecycle() {
    let (mut resolver, sink) = resolver();

    let parent = resolver.create_group(Some("parent")).unwrap().id();
    let child = resolver.create_group(Some("child")).unwrap().id();
    let x = PersonId(11);
    resolver.add_group_member(parent, child).unwrap();
    resolver.add_person_member(child, x).unwrap();

    assert!(matches!(
        resolver.delete_group(GroupId::ANONYMOUS),
        Err(GroupError::ReservedGroup(_))
    ));
    // Still wired up in both directions.
    assert!(matches!(
        resolver.delete_group(child),
        Err(GroupError::GroupInUse(id)) if id == child
    ));

    resolver.remove_group_member(parent, child).unwrap();
    assert!(matches!(
        resolver.delete_group(child),
        Err(GroupError::GroupInUse(_))
    ));
    resolver.remove_person_member(child, x).unwrap();

    assert!(resolver.delete_group(child).unwrap());
    assert!(!resolver.delete_group(child).unwrap());
    assert!(resolver.group_by_name("child").unwrap().is_none());
    assert_eq!(
        resolver.group_by_name("parent").unwrap().unwrap().id(),
        parent
    );
    assert!(sink.events().contains(&GroupEvent::Deleted { group: child }));
}

#[test]
fn is_empty_walks_the_live_graph() {
    let (mut resolver, _) = resolver();

    let a = resolver.create_group(Some("a")).unwrap().id();
    let b = resolver.create_group(Some("b")).unwrap().id();
    let c = resolver.create_group(Some("c")).unwrap().id();
    resolver.add_group_member(a, b).unwrap();
    resolver.add_group_member(b, c).unwrap();

    // No rebuild needed: the walk sees the live subgroup sets.
    assert!(resolver.is_empty(a).unwrap());

    let x = PersonId(21);
    resolver.add_person_member(c, x).unwrap();
    assert!(!resolver.is_empty(a).unwrap());
    assert!(!resolver.is_empty(b).unwrap());
    assert!(!resolver.is_empty(c).unwrap());

    resolver.remove_person_member(c, x).unwrap();
    assert!(resolver.is_empty(a).unwrap());
}

#[test]
fn queries_serve_the_current_cache_until_update() {
    let (mut resolver, _) = resolver();

    let a = resolver.create_group(Some("a")).unwrap().id();
    let b = resolver.create_group(Some("b")).unwrap().id();
    let x = PersonId(2);
    resolver.add_group_member(a, b).unwrap();
    resolver.add_person_member(b, x).unwrap();

    // The pending edge is not in the closure yet.
    let session = TestSession::authenticated(x);
    assert!(!resolver.all_member_groups(&session, x).unwrap().contains(&a));

    // Observing the flag on an untouched group does not rebuild either.
    let untouched = resolver.create_group(Some("untouched")).unwrap().id();
    resolver.update(untouched).unwrap();
    assert!(!resolver.all_member_groups(&session, x).unwrap().contains(&a));

    resolver.update(a).unwrap();
    assert!(resolver.all_member_groups(&session, x).unwrap().contains(&a));
}

/// Store whose closure swap can be made to fail, for exercising rebuild failure semantics.
#[derive(Clone, Debug)]
struct FaultyStore {
    inner: MemoryGroupStore,
    fail_swap: Arc<AtomicBool>,
}

#[derive(Debug, thiserror::Error)]
#[error("storage offline")]
struct StorageOffline;

impl FaultyStore {
    fn new() -> (Self, Arc<AtomicBool>) {
        let fail_swap = Arc::new(AtomicBool::new(false));
        (
            Self {
                inner: MemoryGroupStore::new(),
                fail_swap: fail_swap.clone(),
            },
            fail_swap,
        )
    }
}

impl GroupStore for FaultyStore {
    type Error = StorageOffline;

    fn create_group(&mut self, name: Option<&str>) -> Result<crate::group::Group, Self::Error> {
        Ok(self.inner.create_group(name).unwrap())
    }

    fn group(&self, id: GroupId) -> Result<Option<crate::group::Group>, Self::Error> {
        Ok(self.inner.group(id).unwrap())
    }

    fn group_by_name(&self, name: &str) -> Result<Option<crate::group::Group>, Self::Error> {
        Ok(self.inner.group_by_name(name).unwrap())
    }

    fn remove_group(&mut self, id: GroupId) -> Result<bool, Self::Error> {
        Ok(self.inner.remove_group(id).unwrap())
    }

    fn add_person_edge(&mut self, group: GroupId, person: PersonId) -> Result<bool, Self::Error> {
        Ok(self.inner.add_person_edge(group, person).unwrap())
    }

    fn remove_person_edge(
        &mut self,
        group: GroupId,
        person: PersonId,
    ) -> Result<bool, Self::Error> {
        Ok(self.inner.remove_person_edge(group, person).unwrap())
    }

    fn add_group_edge(&mut self, parent: GroupId, child: GroupId) -> Result<bool, Self::Error> {
        Ok(self.inner.add_group_edge(parent, child).unwrap())
    }

    fn remove_group_edge(&mut self, parent: GroupId, child: GroupId) -> Result<bool, Self::Error> {
        Ok(self.inner.remove_group_edge(parent, child).unwrap())
    }

    fn groups_of(
        &self,
        person: PersonId,
    ) -> Result<std::collections::HashSet<GroupId>, Self::Error> {
        Ok(self.inner.groups_of(person).unwrap())
    }

    fn direct_edges(&self) -> Result<Vec<(GroupId, GroupId)>, Self::Error> {
        Ok(self.inner.direct_edges().unwrap())
    }

    fn ancestors(
        &self,
        descendant: GroupId,
    ) -> Result<std::collections::HashSet<GroupId>, Self::Error> {
        Ok(self.inner.ancestors(descendant).unwrap())
    }

    fn descendants(
        &self,
        ancestor: GroupId,
    ) -> Result<std::collections::HashSet<GroupId>, Self::Error> {
        Ok(self.inner.descendants(ancestor).unwrap())
    }

    fn replace_closure(&mut self, closure: TransitiveClosure) -> Result<(), Self::Error> {
        if self.fail_swap.load(Ordering::SeqCst) {
            return Err(StorageOffline);
        }
        self.inner.replace_closure(closure).unwrap();
        Ok(())
    }

    fn clear_graph_changed(&mut self) -> Result<(), Self::Error> {
        Ok(self.inner.clear_graph_changed().unwrap())
    }
}

#[test]
fn failed_rebuild_propagates_and_can_be_retried() {
    setup_logging();
    let (store, fail_swap) = FaultyStore::new();
    let mut resolver = MembershipResolver::new(store, RecordingSink::default());

    let a = resolver.create_group(Some("a")).unwrap().id();
    let b = resolver.create_group(Some("b")).unwrap().id();
    let x = PersonId(1);
    resolver.add_group_member(a, b).unwrap();
    resolver.add_person_member(b, x).unwrap();

    fail_swap.store(true, Ordering::SeqCst);
    assert!(matches!(
        resolver.update(a),
        Err(GroupError::Store(StorageOffline))
    ));

    // The graph is still flagged, so the retry is a whole new rebuild.
    fail_swap.store(false, Ordering::SeqCst);
    resolver.update(a).unwrap();

    let session = TestSession::authenticated(x);
    assert!(resolver.all_member_groups(&session, x).unwrap().contains(&a));
}
