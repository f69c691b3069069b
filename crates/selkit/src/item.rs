#![forbid(unsafe_code)]

//! Selectable items.
//!
//! An [`Item`] is a cheap, clonable handle to shared selection state. It can
//! live on its own or be held by any number of groups at once.
//!
//! # Ordering
//!
//! On every change the item updates its own flag first, then notifies every
//! group in its registry, and only then emits its own event. Observers of an
//! [`ItemEvent`] therefore always see group state that already agrees with
//! the item.
//!
//! # Invariants
//!
//! 1. `select` on a selected item changes nothing and emits
//!    [`ItemEvent::Reaffirmed`] instead of [`ItemEvent::Selected`].
//! 2. `deselect` on a deselected item is a no-op with no event.
//! 3. An item that no group holds any more cannot stay selected.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::channel::{EventChannel, Subscription};
use crate::config::ItemConfig;
use crate::context::{Cause, Emission, EventContext, OpContext, SelectOptions};
use crate::event::ItemEvent;
use crate::id::{GroupId, ItemId, Participant};
use crate::registry::{GroupSync, Registry};

/// Behavior shared by everything that carries a selection flag.
pub trait Selectable {
    /// Stable identity.
    fn id(&self) -> ItemId;

    /// Current flag.
    fn is_selected(&self) -> bool;

    /// Select with explicit options.
    fn select_with(&self, options: &SelectOptions);

    /// Deselect with explicit options.
    fn deselect_with(&self, options: &SelectOptions);

    /// Select with default options.
    fn select(&self) {
        self.select_with(&SelectOptions::default());
    }

    /// Deselect with default options.
    fn deselect(&self) {
        self.deselect_with(&SelectOptions::default());
    }

    /// Flip the flag with explicit options.
    fn toggle_with(&self, options: &SelectOptions) {
        if self.is_selected() {
            self.deselect_with(options);
        } else {
            self.select_with(options);
        }
    }

    /// Flip the flag with default options.
    fn toggle(&self) {
        self.toggle_with(&SelectOptions::default());
    }
}

/// How an item is currently held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// No group holds the item.
    Standalone,
    /// Exactly one group holds the item; it is notified directly.
    Direct,
    /// Several groups hold the item; each of them is notified.
    Shared,
}

/// Handle to one selectable entity.
///
/// Clones share state; equality and hashing go by [`ItemId`].
#[derive(Clone)]
pub struct Item {
    inner: Rc<ItemInner>,
}

struct ItemInner {
    id: ItemId,
    config: ItemConfig,
    state: RefCell<ItemState>,
    events: EventChannel<ItemEvent>,
}

#[derive(Default)]
struct ItemState {
    selected: bool,
    registry: Registry,
}

impl Item {
    /// Create a deselected, standalone item.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ItemConfig::default())
    }

    /// Create a deselected, standalone item with `config`.
    #[must_use]
    pub fn with_config(config: ItemConfig) -> Self {
        Self {
            inner: Rc::new(ItemInner {
                id: ItemId::next(),
                config,
                state: RefCell::new(ItemState::default()),
                events: EventChannel::new(),
            }),
        }
    }

    /// Stable identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ItemId {
        self.inner.id
    }

    /// The item's configuration.
    #[must_use]
    pub fn config(&self) -> &ItemConfig {
        &self.inner.config
    }

    /// Current flag.
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.inner.state.borrow().selected
    }

    /// Ids of the groups holding this item, in the order they added it.
    #[must_use]
    pub fn memberships(&self) -> Vec<GroupId> {
        self.inner.state.borrow().registry.group_ids()
    }

    /// Whether the item is standalone, directly owned, or shared.
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        match self.inner.state.borrow().registry.len() {
            0 => Ownership::Standalone,
            1 => Ownership::Direct,
            _ => Ownership::Shared,
        }
    }

    /// Observe this item's events.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe(&self, callback: impl Fn(&ItemEvent, &EventContext) + 'static) -> Subscription {
        self.inner.events.subscribe(callback)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.subscriber_count()
    }

    /// Select, emitting [`ItemEvent::Selected`] or [`ItemEvent::Reaffirmed`].
    pub fn select(&self) {
        self.select_with(&SelectOptions::default());
    }

    /// Select with explicit options.
    pub fn select_with(&self, options: &SelectOptions) {
        let mut ctx = OpContext::new(options);
        self.select_in(&mut ctx, options.emission());
    }

    /// Deselect, emitting [`ItemEvent::Deselected`] if the flag changed.
    pub fn deselect(&self) {
        self.deselect_with(&SelectOptions::default());
    }

    /// Deselect with explicit options.
    pub fn deselect_with(&self, options: &SelectOptions) {
        let mut ctx = OpContext::new(options);
        self.deselect_in(&mut ctx, options.emission());
    }

    /// Flip the flag.
    pub fn toggle(&self) {
        self.toggle_with(&SelectOptions::default());
    }

    /// Flip the flag with explicit options.
    pub fn toggle_with(&self, options: &SelectOptions) {
        if self.is_selected() {
            self.deselect_with(options);
        } else {
            self.select_with(options);
        }
    }

    #[inline]
    pub(crate) fn participant(&self) -> Participant {
        Participant::Item(self.inner.id)
    }

    pub(crate) fn select_in(&self, ctx: &mut OpContext, emission: Emission) {
        let me = self.participant();
        if ctx.is_processed(me) {
            return;
        }
        let reaffirm = {
            let mut state = self.inner.state.borrow_mut();
            std::mem::replace(&mut state.selected, true)
        };
        ctx.mark(me);

        let groups = self.inner.state.borrow().registry.live();
        #[cfg(feature = "tracing")]
        if groups.len() > 1 {
            tracing::trace!(item = %self.id(), groups = groups.len(), "fanning select out to shared groups");
        }
        let downstream = emission.downstream();
        for group in groups {
            let id = group.group_id();
            if ctx.is_processed(Participant::Group(id)) || !self.is_held_by(id) {
                continue;
            }
            group.sync_select(self, ctx, downstream);
        }

        if !emission.emits() {
            return;
        }
        if reaffirm {
            if !ctx.quiet_reaffirm() {
                self.emit(ItemEvent::Reaffirmed(self.clone()), ctx);
            }
        } else {
            self.emit(ItemEvent::Selected(self.clone()), ctx);
        }
    }

    pub(crate) fn deselect_in(&self, ctx: &mut OpContext, emission: Emission) {
        {
            let mut state = self.inner.state.borrow_mut();
            if !state.selected {
                return;
            }
            state.selected = false;
        }

        let groups = self.inner.state.borrow().registry.live();
        let downstream = emission.downstream();
        for group in groups {
            if !self.is_held_by(group.group_id()) {
                continue;
            }
            group.sync_deselect(self, ctx, downstream);
        }

        let announce = ctx.cause() != Cause::Orphaned || self.inner.config.announce_orphaning;
        if emission.emits() && announce {
            self.emit(ItemEvent::Deselected(self.clone()), ctx);
        }
    }

    /// Observers of earlier groups may close or leave later ones while the
    /// fan-out runs, so each link is checked again right before it is used.
    fn is_held_by(&self, group: GroupId) -> bool {
        self.inner.state.borrow().registry.contains(group)
    }

    pub(crate) fn register(&self, group: GroupId, link: Weak<dyn GroupSync>) -> bool {
        self.inner.state.borrow_mut().registry.register(group, link)
    }

    /// Forget `group`; returns how many groups still hold the item.
    pub(crate) fn unregister(&self, group: GroupId) -> usize {
        let mut state = self.inner.state.borrow_mut();
        state.registry.unregister(group);
        state.registry.len()
    }

    /// Clear the flag of an item no group holds any more.
    pub(crate) fn clear_if_orphaned(&self) {
        let orphaned_and_selected = {
            let state = self.inner.state.borrow();
            state.selected && state.registry.is_empty()
        };
        if !orphaned_and_selected {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(item = %self.id(), "clearing selection of orphaned item");
        let mut ctx = OpContext::orphaning();
        self.deselect_in(&mut ctx, Emission::Emit);
    }

    fn emit(&self, event: ItemEvent, ctx: &OpContext) {
        self.inner.events.emit(&event, &ctx.event_context());
    }
}

impl Default for Item {
    fn default() -> Self {
        Self::new()
    }
}

impl Selectable for Item {
    fn id(&self) -> ItemId {
        Item::id(self)
    }

    fn is_selected(&self) -> bool {
        Item::is_selected(self)
    }

    fn select_with(&self, options: &SelectOptions) {
        Item::select_with(self, options);
    }

    fn deselect_with(&self, options: &SelectOptions) {
        Item::deselect_with(self, options);
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Item");
        s.field("id", &self.inner.id);
        match self.inner.state.try_borrow() {
            Ok(state) => s
                .field("selected", &state.selected)
                .field("groups", &state.registry),
            Err(_) => s.field("state", &"<borrowed>"),
        };
        s.finish()
    }
}
