// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::group::{GroupId, Member};

/// Domain notifications emitted by the resolver's mutating operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupEvent {
    Created { group: GroupId },
    Deleted { group: GroupId },
    MemberAdded { group: GroupId, member: Member },
    MemberRemoved { group: GroupId, member: Member },
}

/// Fire-and-forget notification sink.
///
/// The core never awaits or depends on the outcome of a notification; delivery, queueing and
/// failure handling are entirely the sink's concern.
pub trait EventSink {
    fn notify(&self, event: GroupEvent);
}

/// Sink which drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn notify(&self, _event: GroupEvent) {}
}
