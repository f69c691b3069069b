#![forbid(unsafe_code)]

//! Behavior shared by both group policies.
//!
//! A group is told about membership changes by its host container through
//! [`SelectionGroup::add`], [`SelectionGroup::remove`] and
//! [`SelectionGroup::reset`], and reconciles selection state on each one.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Add of a member | Host sent a duplicate add | `Err(AlreadyMember)` |
//! | Remove of a non-member | Host sent a stale remove | `Err(NotMember)` |
//! | Any membership change after close | Use after dispose | `Err(Closed)` |
//! | Select of a non-member | Caller error | No-op |
//! | Registry names a group that lacks the item | Internal bug | Panic |

use ahash::AHashSet;

use crate::context::SelectOptions;
use crate::error::SelectionError;
use crate::id::{GroupId, ItemId};
use crate::item::Item;

/// Common interface of [`SingleGroup`](crate::SingleGroup) and
/// [`MultiGroup`](crate::MultiGroup).
pub trait SelectionGroup {
    /// Stable identity.
    fn id(&self) -> GroupId;

    /// Members in host order.
    fn members(&self) -> Vec<Item>;

    /// Number of members.
    fn len(&self) -> usize;

    /// Whether the group has no members.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `item` is a member.
    fn contains(&self, item: &Item) -> bool;

    /// Whether `item` is selected as far as this group is concerned.
    fn is_member_selected(&self, item: &Item) -> bool;

    /// Select `item` through this group.
    fn select_with(&self, item: &Item, options: &SelectOptions);

    /// Deselect `item` through this group.
    fn deselect_with(&self, item: &Item, options: &SelectOptions);

    /// Select `item` with default options.
    fn select(&self, item: &Item) {
        self.select_with(item, &SelectOptions::default());
    }

    /// Deselect `item` with default options.
    fn deselect(&self, item: &Item) {
        self.deselect_with(item, &SelectOptions::default());
    }

    /// Host notification: `item` joined the group.
    fn add(&self, item: &Item) -> Result<(), SelectionError>;

    /// Host notification: `item` left the group.
    fn remove(&self, item: &Item) -> Result<(), SelectionError>;

    /// Host notification: the whole membership was replaced by `items`.
    fn reset(&self, items: &[Item]) -> Result<(), SelectionError>;

    /// Dispose of the group, releasing every member.
    fn close(&self);

    /// Whether [`close`](Self::close) has run.
    fn is_closed(&self) -> bool;
}

/// Ordered member list with O(1) membership checks.
#[derive(Debug, Default)]
pub(crate) struct Members {
    order: Vec<Item>,
    ids: AHashSet<ItemId>,
}

impl Members {
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    /// Append `item`; `false` if it was already present.
    pub(crate) fn push(&mut self, item: Item) -> bool {
        if !self.ids.insert(item.id()) {
            return false;
        }
        self.order.push(item);
        true
    }

    /// Remove `id`; `false` if it was not present.
    pub(crate) fn remove(&mut self, id: ItemId) -> bool {
        if !self.ids.remove(&id) {
            return false;
        }
        self.order.retain(|item| item.id() != id);
        true
    }

    pub(crate) fn to_vec(&self) -> Vec<Item> {
        self.order.clone()
    }

    pub(crate) fn take(&mut self) -> Vec<Item> {
        self.ids.clear();
        std::mem::take(&mut self.order)
    }
}

/// Drop repeated items, keeping the first occurrence.
pub(crate) fn dedup(items: &[Item]) -> Vec<Item> {
    let mut seen = AHashSet::with_capacity(items.len());
    items
        .iter()
        .filter(|item| seen.insert(item.id()))
        .cloned()
        .collect()
}

/// Detach `item` from `group` after the group dropped it, clearing the
/// item's flag if no group holds it any more.
pub(crate) fn release(group: GroupId, item: &Item) {
    item.unregister(group);
    item.clear_if_orphaned();
}

/// The registry of `item` lists `group`, but `group` does not hold `item`.
#[cold]
#[track_caller]
pub(crate) fn desynchronized(item: ItemId, group: GroupId) -> ! {
    #[cfg(feature = "tracing")]
    tracing::error!(%item, %group, "registry and group membership diverged");
    panic!("registry desynchronized: {item} is registered with {group} but not one of its members");
}
