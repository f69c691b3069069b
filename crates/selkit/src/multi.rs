#![forbid(unsafe_code)]

//! Multi-select groups.
//!
//! A [`MultiGroup`] tracks any subset of its members as selected and
//! summarizes the subset as an [`Aggregate`] bucket.
//!
//! # Invariants
//!
//! 1. `selected_count()` equals the number of selected members, and every
//!    one of them has its flag set.
//! 2. `aggregate()` is `Aggregate::classify(selected_count(), len())`; an
//!    empty group is `None`, never `All`.
//! 3. One call emits at most one aggregate event, and only when the bucket
//!    differs from the bucket at the start of the call.
//! 4. A bulk operation emits its group events once, after the loop.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Select of a non-member | Caller error | No-op |
//! | Bulk op on an empty group | Nothing to do | No-op, no `All` |
//! | Membership change after close | Use after dispose | `Err(Closed)` |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};

use crate::channel::{EventChannel, Subscription};
use crate::config::GroupConfig;
use crate::context::{Emission, EventContext, OpContext, SelectOptions};
use crate::error::SelectionError;
use crate::event::{Aggregate, MultiEvent};
use crate::group::{self, Members, SelectionGroup};
use crate::id::{GroupId, ItemId, Participant};
use crate::item::Item;
use crate::registry::GroupSync;

/// Group allowing any subset of members to be selected.
///
/// Clones share state.
///
/// # Example
///
/// ```
/// use selkit::{Aggregate, Item, MultiGroup};
///
/// let items: Vec<Item> = (0..3).map(|_| Item::new()).collect();
/// let group = MultiGroup::with_members(&items);
///
/// items[0].select();
/// assert_eq!(group.aggregate(), Aggregate::Some);
///
/// group.select_all();
/// assert_eq!(group.selected_count(), 3);
/// assert_eq!(group.aggregate(), Aggregate::All);
/// ```
#[derive(Clone)]
pub struct MultiGroup {
    inner: Rc<MultiInner>,
}

struct MultiInner {
    id: GroupId,
    config: GroupConfig,
    state: RefCell<MultiState>,
    /// Nesting depth of running bulk operations; group events wait for zero.
    bulk_depth: Cell<usize>,
    events: EventChannel<MultiEvent>,
}

#[derive(Default)]
struct MultiState {
    members: Members,
    selected: AHashMap<ItemId, Item>,
    closed: bool,
}

impl MultiState {
    fn aggregate(&self) -> Aggregate {
        Aggregate::classify(self.selected.len(), self.members.len())
    }
}

/// Restores the bulk depth even if an observer panics mid-loop.
struct BulkGuard<'a> {
    inner: &'a MultiInner,
}

impl<'a> BulkGuard<'a> {
    fn enter(inner: &'a MultiInner) -> Self {
        inner.bulk_depth.set(inner.bulk_depth.get() + 1);
        Self { inner }
    }
}

impl Drop for BulkGuard<'_> {
    fn drop(&mut self) {
        let depth = &self.inner.bulk_depth;
        depth.set(depth.get().saturating_sub(1));
    }
}

impl MultiGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GroupConfig::default())
    }

    /// Create an empty group with `config`.
    #[must_use]
    pub fn with_config(config: GroupConfig) -> Self {
        Self {
            inner: Rc::new(MultiInner {
                id: GroupId::next(),
                config,
                state: RefCell::new(MultiState::default()),
                bulk_depth: Cell::new(0),
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
        callback: impl Fn(&MultiEvent, &EventContext) + 'static,
    ) -> Subscription {
        self.inner.events.subscribe(callback)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.subscriber_count()
    }

    /// Selected members in host order.
    #[must_use]
    pub fn selected_items(&self) -> Vec<Item> {
        let state = self.inner.state.borrow();
        state
            .members
            .to_vec()
            .into_iter()
            .filter(|item| state.selected.contains_key(&item.id()))
            .collect()
    }

    /// Number of selected members.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.inner.state.borrow().selected.len()
    }

    /// Current aggregate bucket.
    #[must_use]
    pub fn aggregate(&self) -> Aggregate {
        self.inner.state.borrow().aggregate()
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

    /// Select `item`.
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

    /// Deselect `item`.
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
            .deselect_in(item, &mut ctx, options.emission(), false);
    }

    /// Select every member.
    pub fn select_all(&self) {
        self.select_all_with(&SelectOptions::default());
    }

    /// Select every member with explicit options.
    ///
    /// Members that were already selected are reported together in one
    /// [`MultiEvent::ReaffirmedAny`].
    pub fn select_all_with(&self, options: &SelectOptions) {
        let (targets, prev) = {
            let state = self.inner.state.borrow();
            if state.closed || state.members.is_empty() {
                return;
            }
            (state.members.to_vec(), state.aggregate())
        };
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "selection_bulk",
            group = %self.id(),
            op = "select_all",
            members = targets.len()
        )
        .entered();

        let root = OpContext::new(options);
        let emission = options.emission();
        let mut reaffirmed = Vec::new();
        {
            let _bulk = BulkGuard::enter(&self.inner);
            for item in &targets {
                let already = {
                    let state = self.inner.state.borrow();
                    if !state.members.contains(item.id()) {
                        continue;
                    }
                    state.selected.contains_key(&item.id())
                };
                if already {
                    reaffirmed.push(item.clone());
                }
                let mut ctx = root.fork();
                self.inner.select_in(item, &mut ctx, emission.hushed());
            }
        }
        self.inner.announce(prev, reaffirmed, &root, emission);
    }

    /// Deselect every member.
    pub fn deselect_all(&self) {
        self.deselect_all_with(&SelectOptions::default());
    }

    /// Deselect every member with explicit options. No-op when nothing is
    /// selected.
    pub fn deselect_all_with(&self, options: &SelectOptions) {
        let (targets, prev) = {
            let state = self.inner.state.borrow();
            if state.closed || state.selected.is_empty() {
                return;
            }
            let targets: Vec<Item> = state
                .members
                .to_vec()
                .into_iter()
                .filter(|item| state.selected.contains_key(&item.id()))
                .collect();
            (targets, state.aggregate())
        };
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "selection_bulk",
            group = %self.id(),
            op = "deselect_all",
            members = targets.len()
        )
        .entered();

        let root = OpContext::new(options);
        let emission = options.emission();
        {
            let _bulk = BulkGuard::enter(&self.inner);
            for item in &targets {
                let mut ctx = root.fork();
                self.inner
                    .deselect_in(item, &mut ctx, emission.hushed(), false);
            }
        }
        self.inner.announce(prev, Vec::new(), &root, emission);
    }

    /// Alias of [`deselect_all`](Self::deselect_all).
    pub fn select_none(&self) {
        self.deselect_all();
    }

    /// Alias of [`deselect_all_with`](Self::deselect_all_with).
    pub fn select_none_with(&self, options: &SelectOptions) {
        self.deselect_all_with(options);
    }

    /// Deselect everything if every member is selected, otherwise select
    /// everything.
    pub fn toggle_select_all(&self) {
        self.toggle_select_all_with(&SelectOptions::default());
    }

    /// [`toggle_select_all`](Self::toggle_select_all) with explicit options.
    pub fn toggle_select_all_with(&self, options: &SelectOptions) {
        let all = {
            let state = self.inner.state.borrow();
            !state.members.is_empty() && state.selected.len() == state.members.len()
        };
        if all {
            self.deselect_all_with(options);
        } else {
            self.select_all_with(options);
        }
    }

    /// Host notification: `item` joined the group.
    ///
    /// A selected newcomer is counted at once; the group announces the new
    /// aggregate if it changed. The adopted item does not emit a reaffirm
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
    /// If `item` was selected the group announces the new aggregate. If no
    /// other group holds it, its flag is cleared first.
    pub fn remove(&self, item: &Item) -> Result<(), SelectionError> {
        let (was_selected, prev) = {
            let mut state = self.inner.state.borrow_mut();
            if state.closed {
                return Err(SelectionError::Closed(self.id()));
            }
            let prev = state.aggregate();
            if !state.members.remove(item.id()) {
                return Err(SelectionError::NotMember {
                    item: item.id(),
                    group: self.id(),
                });
            }
            (state.selected.remove(&item.id()).is_some(), prev)
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
            self.inner.announce(prev, Vec::new(), &ctx, Emission::Emit);
        }
        item.clear_if_orphaned();
        Ok(())
    }

    /// Host notification: the membership was replaced by `items`.
    ///
    /// Departing members are released and every incoming item that is
    /// already selected is counted. The group itself emits nothing.
    pub fn reset(&self, items: &[Item]) -> Result<(), SelectionError> {
        if self.is_closed() {
            return Err(SelectionError::Closed(self.id()));
        }
        self.install(items);
        Ok(())
    }

    /// Release every member and stop accepting membership changes.
    pub fn close(&self) {
        let released = {
            let mut state = self.inner.state.borrow_mut();
            if state.closed {
                return;
            }
            state.closed = true;
            state.selected.clear();
            state.members.take()
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(group = %self.id(), members = released.len(), "closing multi-select group");
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
            policy = "multi",
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
                state.selected.remove(&item.id());
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
            state.selected.clear();
        }
        let link = self.link();
        for item in &incoming {
            item.register(self.id(), link.clone());
        }

        for item in incoming.iter().filter(|item| item.is_selected()) {
            let mut ctx = OpContext::new(&SelectOptions::silent());
            self.inner.select_in(item, &mut ctx, Emission::Suppressed);
        }
    }
}

impl Default for MultiGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiInner {
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
        let (prev, reaffirm) = {
            let mut state = self.state.borrow_mut();
            let prev = state.aggregate();
            let reaffirm = state.selected.insert(item.id(), item.clone()).is_some();
            (prev, reaffirm)
        };
        ctx.mark(me);

        if !ctx.is_processed(item.participant()) {
            item.select_in(ctx, emission.downstream());
        }

        let reaffirmed = if reaffirm {
            vec![item.clone()]
        } else {
            Vec::new()
        };
        self.announce(prev, reaffirmed, ctx, emission);
    }

    fn deselect_in(&self, item: &Item, ctx: &mut OpContext, emission: Emission, skip_item: bool) {
        let prev = {
            let mut state = self.state.borrow_mut();
            let prev = state.aggregate();
            if state.selected.remove(&item.id()).is_none() {
                return;
            }
            prev
        };

        if !skip_item {
            item.deselect_in(ctx, emission.downstream());
        }
        self.announce(prev, Vec::new(), ctx, emission);
    }

    /// Emit the group events of one call: reaffirmed members first, then the
    /// aggregate if its bucket moved away from `prev`.
    fn announce(&self, prev: Aggregate, reaffirmed: Vec<Item>, ctx: &OpContext, emission: Emission) {
        if !emission.emits() {
            return;
        }
        if self.bulk_depth.get() > 0 {
            return;
        }
        let now = self.state.borrow().aggregate();
        if !reaffirmed.is_empty() && !ctx.quiet_reaffirm() {
            self.emit(MultiEvent::ReaffirmedAny(reaffirmed), ctx);
        }
        if now != prev {
            self.emit(MultiEvent::Aggregate(now), ctx);
        }
    }

    fn emit(&self, event: MultiEvent, ctx: &OpContext) {
        self.events.emit(&event, &ctx.event_context());
    }
}

impl GroupSync for MultiInner {
    fn group_id(&self) -> GroupId {
        self.id
    }

    fn sync_select(&self, item: &Item, ctx: &mut OpContext, emission: Emission) {
        self.assert_member(item);
        self.select_in(item, ctx, emission);
    }

    fn sync_deselect(&self, item: &Item, ctx: &mut OpContext, emission: Emission) {
        self.assert_member(item);
        self.deselect_in(item, ctx, emission, true);
    }
}

impl Drop for MultiInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.closed {
            return;
        }
        state.closed = true;
        state.selected.clear();
        let released = state.members.take();
        for item in &released {
            group::release(self.id, item);
        }
    }
}

impl SelectionGroup for MultiGroup {
    fn id(&self) -> GroupId {
        MultiGroup::id(self)
    }

    fn members(&self) -> Vec<Item> {
        MultiGroup::members(self)
    }

    fn len(&self) -> usize {
        MultiGroup::len(self)
    }

    fn contains(&self, item: &Item) -> bool {
        MultiGroup::contains(self, item)
    }

    fn is_member_selected(&self, item: &Item) -> bool {
        self.inner.state.borrow().selected.contains_key(&item.id())
    }

    fn select_with(&self, item: &Item, options: &SelectOptions) {
        MultiGroup::select_with(self, item, options);
    }

    fn deselect_with(&self, item: &Item, options: &SelectOptions) {
        MultiGroup::deselect_with(self, item, options);
    }

    fn add(&self, item: &Item) -> Result<(), SelectionError> {
        MultiGroup::add(self, item)
    }

    fn remove(&self, item: &Item) -> Result<(), SelectionError> {
        MultiGroup::remove(self, item)
    }

    fn reset(&self, items: &[Item]) -> Result<(), SelectionError> {
        MultiGroup::reset(self, items)
    }

    fn close(&self) {
        MultiGroup::close(self);
    }

    fn is_closed(&self) -> bool {
        MultiGroup::is_closed(self)
    }
}

impl fmt::Debug for MultiGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MultiGroup");
        s.field("id", &self.inner.id);
        if let Some(label) = &self.inner.config.label {
            s.field("label", label);
        }
        match self.inner.state.try_borrow() {
            Ok(state) => s
                .field("members", &state.members.len())
                .field("selected", &state.selected.len())
                .field("aggregate", &state.aggregate())
                .field("closed", &state.closed),
            Err(_) => s.field("state", &"<borrowed>"),
        };
        s.finish()
    }
}
