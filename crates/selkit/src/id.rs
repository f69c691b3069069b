#![forbid(unsafe_code)]

//! Stable identifiers for items and groups.
//!
//! Identifiers are allocated from process-wide counters and are never
//! reused, so they are safe to use as map keys for the lifetime of the
//! program. `0` is never handed out.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for item ids.
static ITEM_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Global counter for group ids.
static GROUP_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of an [`Item`](crate::Item).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(u64);

impl ItemId {
    pub(crate) fn next() -> Self {
        Self(ITEM_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Unique identifier of a selection group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(u64);

impl GroupId {
    pub(crate) fn next() -> Self {
        Self(GROUP_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Anything that can take part in one selection operation.
///
/// Used as the key of the operation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Participant {
    Item(ItemId),
    Group(GroupId),
}
