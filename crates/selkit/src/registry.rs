#![forbid(unsafe_code)]

//! Per-item record of the groups that currently hold the item.
//!
//! The registry is the item side of the synchronization protocol: when an
//! item's flag changes it walks its registry and hands the change to every
//! live group. One entry means direct ownership, several mean the item is
//! shared.
//!
//! Links are `Weak` so an item never keeps a group alive. Groups unregister
//! themselves on close and on drop; a dead link that slips through is
//! skipped.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::context::{Emission, OpContext};
use crate::id::GroupId;
use crate::item::Item;

/// The group side of the synchronization protocol.
///
/// Called by an item for every group in its registry. Implementations must
/// hold the item as a member; a registry entry for a group that does not is
/// a desynchronization and panics.
pub(crate) trait GroupSync {
    fn group_id(&self) -> GroupId;

    /// The item's flag became (or stayed) true within `ctx`.
    fn sync_select(&self, item: &Item, ctx: &mut OpContext, emission: Emission);

    /// The item's flag became false within `ctx`.
    fn sync_deselect(&self, item: &Item, ctx: &mut OpContext, emission: Emission);
}

struct Membership {
    group: GroupId,
    link: Weak<dyn GroupSync>,
}

/// Groups holding one item, in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    memberships: Vec<Membership>,
}

impl Registry {
    /// Record membership in `group`. Returns `false` if it was already
    /// recorded.
    pub(crate) fn register(&mut self, group: GroupId, link: Weak<dyn GroupSync>) -> bool {
        if self.contains(group) {
            return false;
        }
        self.memberships.push(Membership { group, link });
        true
    }

    /// Drop membership in `group`. Returns `false` if there was none.
    pub(crate) fn unregister(&mut self, group: GroupId) -> bool {
        let before = self.memberships.len();
        self.memberships.retain(|m| m.group != group);
        self.memberships.len() != before
    }

    pub(crate) fn contains(&self, group: GroupId) -> bool {
        self.memberships.iter().any(|m| m.group == group)
    }

    pub(crate) fn len(&self) -> usize {
        self.memberships.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.memberships.is_empty()
    }

    pub(crate) fn group_ids(&self) -> Vec<GroupId> {
        self.memberships.iter().map(|m| m.group).collect()
    }

    /// Upgrade every link that is still alive.
    pub(crate) fn live(&self) -> Vec<Rc<dyn GroupSync>> {
        self.memberships
            .iter()
            .filter_map(|m| m.link.upgrade())
            .collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.memberships.iter().map(|m| m.group))
            .finish()
    }
}
