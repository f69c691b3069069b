#![forbid(unsafe_code)]

//! Errors from group membership operations.
//!
//! Selection itself never fails: invalid selections are no-ops. Only the
//! host-facing membership calls (`add`, `remove`, `reset`) report errors.

use crate::id::{GroupId, ItemId};

/// Errors from membership operations on a selection group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionError {
    /// The item is already a member of the group.
    AlreadyMember { item: ItemId, group: GroupId },
    /// The item is not a member of the group.
    NotMember { item: ItemId, group: GroupId },
    /// The group was closed and no longer accepts membership changes.
    Closed(GroupId),
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyMember { item, group } => {
                write!(f, "{item} is already a member of {group}")
            }
            Self::NotMember { item, group } => write!(f, "{item} is not a member of {group}"),
            Self::Closed(group) => write!(f, "{group} is closed"),
        }
    }
}

impl std::error::Error for SelectionError {}
