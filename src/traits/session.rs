// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;

use crate::group::{GroupId, PersonId};

/// Identity context of the request currently being served.
///
/// Special groups are grants attached to the session itself rather than to the persisted graph,
/// for example groups assigned by network origin or token. They exist only for the current
/// request, which is why membership resolution can consult them for the session's own identity
/// but never for anybody else.
pub trait SessionContext {
    /// The authenticated person, if any.
    fn current_person(&self) -> Option<PersonId>;

    /// Session-scoped group grants from outside the stored graph.
    fn special_groups(&self) -> HashSet<GroupId>;
}
