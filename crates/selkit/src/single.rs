#![forbid(unsafe_code)]

//! Single-select groups.
//!
//! A [`SingleGroup`] holds an ordered set of items and allows at most one of
//! them to be selected. Selecting another member deselects the previous one,
//! whether the request came through the group or straight from the item.
//!
//! # Invariants
//!
//! 1. At most one member is selected as far as the group is concerned, and
//!    if one is, its own flag is true.
//! 2. Every member lists the group in its registry and vice versa.
//! 3. A reset keeps the last preselected incoming item and clears the
//!    others without item or group events of its own; other groups holding
//!    a cleared item still announce the change.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Select of a non-member | Caller error | No-op |
//! | Membership change after close | Use after dispose | `Err(Closed)` |
//! | Group dropped without close | Owner went away | Same cleanup as close |

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashSet;

use crate::channel::{EventChannel, Subscription};
use crate::config::GroupConfig;
use crate::context::{Emission, EventContext, OpContext, SelectOptions};
use crate::error::SelectionError;
use crate::event::SingleEvent;
use crate::group::{self, Members, SelectionGroup};
use crate::id::{GroupId, ItemId, Participant};
use crate::item::Item;
use crate::registry::GroupSync;

/// Group allowing at most one selected member.
///
/// Clones share state.
///
/// # Example
///
/// ```
/// use selkit::{Item, SingleGroup};
///
/// let a = Item::new();
/// let b = Item::new();
/// let group = SingleGroup::with_members(&[a.clone(), b.clone()]);
///
/// group.select(&a);
/// b.select();
///
/// assert!(!a.is_selected());
/// assert_eq!(group.selected(), Some(b));
/// ```
#[derive(Clone)]
pub struct SingleGroup {
    inner: Rc<SingleInner>,
}

struct SingleInner {
    id: GroupId,
    config: GroupConfig,
    state: RefCell<SingleState>,
    events: EventChannel<SingleEvent>,
}

#[derive(Default)]
struct SingleState {
    members: Members,
    selected: Option<Item>,
    closed: bool,
}

impl SingleGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GroupConfig::default())
    }

    /// Create an empty group with `config`.
    #[must_use]
    pub fn with_config(config: GroupConfig) -> Self {
        Self {
            inner: Rc::new(SingleInner {
                id: GroupId::next(),
                config,
                state: RefCell::new(SingleState::default()),
                events: EventChannel::new(),
            }),
        }
    }

    /// Create a group holding `items`, reconciled as by [`reset`](Self::reset).
    #[must_use]
    pub fn with_members(items: &[Item]) -> Self {
        let group = Self::new();
        group.install(items);
        group
    }

    /// Stable identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.inner.id
    }

    /// The group's configuration.
    #[must_use]
    pub fn config(&self) -> &GroupConfig {
        &self.inner.config
    }

    /// Observe this group's events.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe(
        &self,
        callback: impl Fn(&SingleEvent, &EventContext) + 'static,
    ) -> Subscription {
        self.inner.events.subscribe(callback)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.subscriber_count()
    }

    /// The selected member, if any.
    #[must_use]
    pub fn selected(&self) -> Option<Item> {
        self.inner.state.borrow().selected.clone()
    }

    /// Members in host order.
    #[must_use]
    pub fn members(&self) -> Vec<Item> {
        self.inner.state.borrow().members.to_vec()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.borrow().members.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().members.is_empty()
    }

    /// Whether `item` is a member.
    #[must_use]
    pub fn contains(&self, item: &Item) -> bool {
        self.inner.state.borrow().members.contains(item.id())
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.borrow().closed
    }

    /// Select `item`, deselecting the previous selection.
    pub fn select(&self, item: &Item) {
        self.select_with(item, &SelectOptions::default());
    }

    /// Select `item` with explicit options. No-op unless `item` is a member.
    pub fn select_with(&self, item: &Item, options: &SelectOptions) {
        if !self.inner.accepts(item) {
            return;
        }
        let mut ctx = OpContext::new(options);
        self.inner.select_in(item, &mut ctx, options.emission());
    }

    /// Deselect `item` if it is the selected member.
    pub fn deselect(&self, item: &Item) {
        self.deselect_with(item, &SelectOptions::default());
    }

    /// Deselect `item` with explicit options.
    pub fn deselect_with(&self, item: &Item, options: &SelectOptions) {
        if self.is_closed() {
            return;
        }
        let mut ctx = OpContext::new(options);
        self.inner
            .deselect_in(Some(item), &mut ctx, options.emission(), false);
    }

    /// Deselect whichever member is selected.
    pub fn deselect_current(&self) {
        self.deselect_current_with(&SelectOptions::default());
    }

    /// Deselect whichever member is selected, with explicit options.
    pub fn deselect_current_with(&self, options: &SelectOptions) {
        if self.is_closed() {
            return;
        }
        let mut ctx = OpContext::new(options);
        self.inner
            .deselect_in(None, &mut ctx, options.emission(), false);
    }

    /// Host notification: `item` joined the group.
    ///
    /// A selected newcomer becomes the group's selection and the previous
    /// selection is deselected. The adopted item does not emit a reaffirm
    /// event.
    pub fn add(&self, item: &Item) -> Result<(), SelectionError> {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.closed {
                return Err(SelectionError::Closed(self.id()));
            }
            if !state.members.push(item.clone()) {
                return Err(SelectionError::AlreadyMember {
                    item: item.id(),
                    group: self.id(),
                });
            }
        }
        item.register(self.id(), self.link());
        if item.is_selected() {
            let mut ctx = OpContext::adopting();
            self.inner.select_in(item, &mut ctx, Emission::Emit);
        }
        Ok(())
    }

    /// Host notification: `item` left the group.
    ///
    /// If `item` was the selection the group emits
    /// [`SingleEvent::DeselectedOne`]. If no other group holds it, its flag
    /// is cleared first.
    pub fn remove(&self, item: &Item) -> Result<(), SelectionError> {
        let was_selected = {
            let mut state = self.inner.state.borrow_mut();
            if state.closed {
                return Err(SelectionError::Closed(self.id()));
            }
            if !state.members.remove(item.id()) {
                return Err(SelectionError::NotMember {
                    item: item.id(),
                    group: self.id(),
                });
            }
            if state.selected.as_ref() == Some(item) {
                state.selected = None;
                true
            } else {
                false
            }
        };

        let remaining = item.unregister(self.id());
        if was_selected {
            let mut ctx = if remaining == 0 {
                OpContext::orphaning()
            } else {
                OpContext::new(&SelectOptions::default())
            };
            if remaining == 0 {
                item.deselect_in(&mut ctx, Emission::Emit);
            }
            self.inner
                .emit(SingleEvent::DeselectedOne(item.clone()), &ctx);
        }
        item.clear_if_orphaned();
        Ok(())
    }

    /// Host notification: the membership was replaced by `items`.
    ///
    /// Departing members are released. Of the incoming items that are
    /// already selected only the last one stays selected; the others are
    /// deselected without an item event. The group itself emits nothing,
    /// other groups holding a deselected item do.
    pub fn reset(&self, items: &[Item]) -> Result<(), SelectionError> {
        if self.is_closed() {
            return Err(SelectionError::Closed(self.id()));
        }
        self.install(items);
        Ok(())
    }

    /// Release every member and stop accepting membership changes.
    ///
    /// Members that no other group holds are deselected. The group emits
    /// nothing. Closing twice is a no-op.
    pub fn close(&self) {
        let released = {
            let mut state = self.inner.state.borrow_mut();
            if state.closed {
                return;
            }
            state.closed = true;
            state.selected = None;
            state.members.take()
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(group = %self.id(), members = released.len(), "closing single-select group");
        for item in &released {
            group::release(self.id(), item);
        }
    }

    fn link(&self) -> Weak<dyn GroupSync> {
        let rc: Rc<dyn GroupSync> = self.inner.clone();
        Rc::downgrade(&rc)
    }

    fn install(&self, items: &[Item]) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "selection_reset",
            group = %self.id(),
            policy = "single",
            incoming = items.len()
        )
        .entered();

        let incoming = group::dedup(items);
        let keep: AHashSet<ItemId> = incoming.iter().map(Item::id).collect();

        let departing: Vec<Item> = {
            let mut state = self.inner.state.borrow_mut();
            let departing: Vec<Item> = state
                .members
                .to_vec()
                .into_iter()
                .filter(|item| !keep.contains(&item.id()))
                .collect();
            for item in &departing {
                state.members.remove(item.id());
                if state.selected.as_ref() == Some(item) {
                    state.selected = None;
                }
            }
            departing
        };
        for item in &departing {
            group::release(self.id(), item);
        }

        {
            let mut state = self.inner.state.borrow_mut();
            state.members.take();
            for item in &incoming {
                state.members.push(item.clone());
            }
            state.selected = None;
        }
        let link = self.link();
        for item in &incoming {
            item.register(self.id(), link.clone());
        }

        let preselected: Vec<Item> = incoming
            .iter()
            .filter(|item| item.is_selected())
            .cloned()
            .collect();
        if let Some((last, earlier)) = preselected.split_last() {
            #[cfg(feature = "tracing")]
            if !earlier.is_empty() {
                tracing::debug!(
                    group = %self.id(),
                    kept = %last.id(),
                    cleared = earlier.len(),
                    "reset found several selected items"
                );
            }
            // The items stay quiet; other groups holding them still announce.
            for item in earlier {
                let mut ctx = OpContext::new(&SelectOptions::default());
                item.deselect_in(&mut ctx, Emission::PropagateOnly);
            }
            let mut ctx = OpContext::new(&SelectOptions::silent());
            self.inner.select_in(last, &mut ctx, Emission::Suppressed);
        }
    }
}

impl Default for SingleGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleInner {
    #[inline]
    fn participant(&self) -> Participant {
        Participant::Group(self.id)
    }

    fn accepts(&self, item: &Item) -> bool {
        let state = self.state.borrow();
        !state.closed && state.members.contains(item.id())
    }

    fn assert_member(&self, item: &Item) {
        if !self.state.borrow().members.contains(item.id()) {
            group::desynchronized(item.id(), self.id);
        }
    }

    fn select_in(&self, item: &Item, ctx: &mut OpContext, emission: Emission) {
        let me = self.participant();
        if ctx.is_processed(me) {
            return;
        }
        let reaffirm = self.state.borrow().selected.as_ref() == Some(item);
        if !reaffirm {
            self.deselect_in(None, ctx, emission.downstream(), false);
            self.state.borrow_mut().selected = Some(item.clone());
        }
        ctx.mark(me);

        if !ctx.is_processed(item.participant()) {
            item.select_in(ctx, emission.downstream());
        }

        if !emission.emits() {
            return;
        }
        if reaffirm {
            if !ctx.quiet_reaffirm() {
                self.emit(SingleEvent::ReaffirmedInGroup(item.clone()), ctx);
            }
        } else {
            self.emit(SingleEvent::SelectedOne(item.clone()), ctx);
        }
    }

    /// Clear the selection if it is `target` (or anything, for `None`).
    ///
    /// `skip_item` is set when the item itself started the chain and has
    /// already cleared its flag.
    fn deselect_in(
        &self,
        target: Option<&Item>,
        ctx: &mut OpContext,
        emission: Emission,
        skip_item: bool,
    ) {
        let current = {
            let mut state = self.state.borrow_mut();
            let Some(current) = state.selected.clone() else {
                return;
            };
            if target.is_some_and(|t| *t != current) {
                return;
            }
            state.selected = None;
            current
        };

        if !skip_item {
            current.deselect_in(ctx, emission.downstream());
        }
        if emission.emits() {
            self.emit(SingleEvent::DeselectedOne(current), ctx);
        }
    }

    fn emit(&self, event: SingleEvent, ctx: &OpContext) {
        self.events.emit(&event, &ctx.event_context());
    }
}

impl GroupSync for SingleInner {
    fn group_id(&self) -> GroupId {
        self.id
    }

    fn sync_select(&self, item: &Item, ctx: &mut OpContext, emission: Emission) {
        self.assert_member(item);
        self.select_in(item, ctx, emission);
    }

    fn sync_deselect(&self, item: &Item, ctx: &mut OpContext, emission: Emission) {
        self.assert_member(item);
        self.deselect_in(Some(item), ctx, emission, true);
    }
}

impl Drop for SingleInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.closed {
            return;
        }
        state.closed = true;
        state.selected = None;
        let released = state.members.take();
        for item in &released {
            group::release(self.id, item);
        }
    }
}

impl SelectionGroup for SingleGroup {
    fn id(&self) -> GroupId {
        SingleGroup::id(self)
    }

    fn members(&self) -> Vec<Item> {
        SingleGroup::members(self)
    }

    fn len(&self) -> usize {
        SingleGroup::len(self)
    }

    fn contains(&self, item: &Item) -> bool {
        SingleGroup::contains(self, item)
    }

    fn is_member_selected(&self, item: &Item) -> bool {
        self.inner.state.borrow().selected.as_ref() == Some(item)
    }

    fn select_with(&self, item: &Item, options: &SelectOptions) {
        SingleGroup::select_with(self, item, options);
    }

    fn deselect_with(&self, item: &Item, options: &SelectOptions) {
        SingleGroup::deselect_with(self, item, options);
    }

    fn add(&self, item: &Item) -> Result<(), SelectionError> {
        SingleGroup::add(self, item)
    }

    fn remove(&self, item: &Item) -> Result<(), SelectionError> {
        SingleGroup::remove(self, item)
    }

    fn reset(&self, items: &[Item]) -> Result<(), SelectionError> {
        SingleGroup::reset(self, items)
    }

    fn close(&self) {
        SingleGroup::close(self);
    }

    fn is_closed(&self) -> bool {
        SingleGroup::is_closed(self)
    }
}

impl fmt::Debug for SingleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SingleGroup");
        s.field("id", &self.inner.id);
        if let Some(label) = &self.inner.config.label {
            s.field("label", label);
        }
        match self.inner.state.try_borrow() {
            Ok(state) => s
                .field("members", &state.members.len())
                .field("selected", &state.selected.as_ref().map(Item::id))
                .field("closed", &state.closed),
            Err(_) => s.field("state", &"<borrowed>"),
        };
        s.finish()
    }
}
