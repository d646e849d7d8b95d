// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg_attr(doctest, doc = include_str!("../README.md"))]

//! Group hierarchy and transitive membership resolution.
//!
//! Groups contain people and other groups, forming a directed acyclic graph. Answering "is this
//! person, directly or through any chain of subgroups, a member of this group?" sits on the hot
//! path of every authorisation check in a repository, so this crate keeps a materialised
//! transitive-closure cache next to the direct edges: one `(ancestor, descendant)` row for every
//! reachable pair of groups, fully rebuilt whenever the direct edges change and served from
//! indexed point lookups in between.
//!
//! The [`MembershipResolver`] is the single entry point. It mutates direct edges (idempotently,
//! rejecting cycles), marks the graph as changed, rebuilds the closure on demand and answers all
//! membership queries from direct containment plus the cache, never by walking the live graph.
//!
//! Persistence, session identity and event delivery are external collaborators consumed through
//! the narrow interfaces in [`traits`]. An in-memory store implementation is provided in
//! [`memory`].

pub mod closure;
pub mod graph;
pub mod group;
pub mod memory;
pub mod resolver;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;

pub use closure::{TransitiveClosure, build_closure};
pub use group::{Group, GroupId, Member, PersonId};
pub use memory::MemoryGroupStore;
pub use resolver::{GroupError, MembershipResolver};
pub use traits::{EventSink, GroupEvent, GroupStore, NoopSink, SessionContext};
