// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::group::{GroupId, PersonId};
use crate::traits::{EventSink, GroupEvent, SessionContext};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Fixed session context for driving the resolver in tests.
#[derive(Clone, Debug, Default)]
pub struct TestSession {
    person: Option<PersonId>,
    special: HashSet<GroupId>,
}

impl TestSession {
    /// A session without an authenticated person.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session authenticated as the given person.
    pub fn authenticated(person: PersonId) -> Self {
        Self {
            person: Some(person),
            special: HashSet::new(),
        }
    }

    /// Attach session-scoped special groups.
    pub fn with_special_groups(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.special.extend(groups);
        self
    }
}

impl SessionContext for TestSession {
    fn current_person(&self) -> Option<PersonId> {
        self.person
    }

    fn special_groups(&self) -> HashSet<GroupId> {
        self.special.clone()
    }
}

/// Sink which records every notification for later assertions.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<GroupEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<GroupEvent> {
        self.events.lock().expect("acquire event log lock").clone()
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: GroupEvent) {
        self.events.lock().expect("acquire event log lock").push(event);
    }
}

/// Generate a random acyclic direct-edge set over `nodes` groups.
///
/// Edges only ever run from a lower id to a higher one, so the result is a DAG by construction.
pub fn random_dag<R: Rng>(rng: &mut R, nodes: u64, density: f64) -> Vec<(GroupId, GroupId)> {
    let mut edges = Vec::new();
    for parent in 0..nodes {
        for child in (parent + 1)..nodes {
            if rng.random_bool(density) {
                edges.push((GroupId(parent), GroupId(child)));
            }
        }
    }
    edges
}
