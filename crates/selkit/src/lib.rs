#![forbid(unsafe_code)]

//! Selection state for items shared across selection groups.
//!
//! This crate keeps one boolean "selected" flag per [`Item`] consistent with
//! the groups that hold the item:
//!
//! - [`SingleGroup`]: at most one member selected at a time.
//! - [`MultiGroup`]: any subset selected, summarized as an [`Aggregate`]
//!   bucket (`None`, `Some`, `All`).
//!
//! An item may belong to any number of groups at once. A change that enters
//! through the item or through any one group is carried to every other group
//! holding the item within the same call.
//!
//! # Architecture
//!
//! Items and groups are cheap `Rc` handles with `RefCell` state; the crate is
//! single-threaded. Each item keeps a registry of `Weak` links to the groups
//! that hold it. A selection call creates an operation marker that records
//! which participants already handled it, so the originating side is never
//! asked to process its own change twice.
//!
//! Observers subscribe per item or per group and receive the event together
//! with an [`EventContext`] carrying caller [`Metadata`].
//!
//! # Invariants
//!
//! 1. An item's flag is updated before any group or item event about it.
//! 2. When a call enters through a group, the item's event precedes the
//!    group's event.
//! 3. No observer ever sees two members of a [`SingleGroup`] flagged
//!    selected.
//! 4. An item that no group holds any more is deselected.
//!
//! # Example
//!
//! ```
//! use selkit::{Aggregate, Item, MultiGroup, SingleGroup};
//!
//! let shared = Item::new();
//! let other = Item::new();
//!
//! let tabs = SingleGroup::with_members(&[shared.clone(), other.clone()]);
//! let list = MultiGroup::with_members(&[shared.clone(), other.clone()]);
//!
//! list.select(&shared);
//! assert_eq!(tabs.selected(), Some(shared.clone()));
//!
//! other.select();
//! assert!(!shared.is_selected());
//! assert_eq!(list.selected_items(), vec![other]);
//! assert_eq!(list.aggregate(), Aggregate::Some);
//! ```

mod channel;
mod config;
mod context;
mod error;
mod event;
mod group;
mod id;
mod item;
mod multi;
mod registry;
mod single;

pub use channel::{EventChannel, Subscription, SubscriptionScope};
pub use config::{GroupConfig, ItemConfig};
pub use context::{Cause, EventContext, Metadata, SelectOptions};
pub use error::SelectionError;
pub use event::{Aggregate, ItemEvent, MultiEvent, SingleEvent};
pub use group::SelectionGroup;
pub use id::{GroupId, ItemId};
pub use item::{Item, Ownership, Selectable};
pub use multi::MultiGroup;
pub use single::SingleGroup;
