//! Property tests: random operation sequences over shared items.
//!
//! A small universe of items is spread over two single-select and two
//! multi-select groups with overlapping membership. After every operation
//! the group views must agree with the item flags.

use proptest::prelude::*;
use selkit::{Aggregate, Item, MultiGroup, SelectOptions, SelectionGroup, SingleGroup};

const ITEMS: usize = 6;
const GROUPS: usize = 4;

#[derive(Clone, Debug)]
enum Op {
    ItemSelect(usize),
    ItemDeselect(usize),
    ItemToggle(usize),
    GroupSelect(usize, usize),
    GroupDeselect(usize, usize),
    SilentSelect(usize, usize),
    SelectAll(usize),
    DeselectAll(usize),
    ToggleAll(usize),
    Add(usize, usize),
    Remove(usize, usize),
    Reset(usize, Vec<usize>),
}

fn item_op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ITEMS).prop_map(Op::ItemSelect),
        (0..ITEMS).prop_map(Op::ItemDeselect),
        (0..ITEMS).prop_map(Op::ItemToggle),
    ]
}

fn group_op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..GROUPS, 0..ITEMS).prop_map(|(g, i)| Op::GroupSelect(g, i)),
        (0..GROUPS, 0..ITEMS).prop_map(|(g, i)| Op::GroupDeselect(g, i)),
        (0..GROUPS, 0..ITEMS).prop_map(|(g, i)| Op::SilentSelect(g, i)),
        (0..2usize).prop_map(Op::SelectAll),
        (0..2usize).prop_map(Op::DeselectAll),
        (0..2usize).prop_map(Op::ToggleAll),
    ]
}

fn membership_op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..GROUPS, 0..ITEMS).prop_map(|(g, i)| Op::Add(g, i)),
        (0..GROUPS, 0..ITEMS).prop_map(|(g, i)| Op::Remove(g, i)),
        (0..GROUPS, prop::collection::vec(0..ITEMS, 0..ITEMS))
            .prop_map(|(g, indices)| Op::Reset(g, indices)),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => item_op_strategy(),
        4 => group_op_strategy(),
        2 => membership_op_strategy(),
    ]
}

struct World {
    items: Vec<Item>,
    singles: Vec<SingleGroup>,
    multis: Vec<MultiGroup>,
}

impl World {
    /// Groups 0 and 1 are single-select, 2 and 3 multi-select. Membership
    /// overlaps so that items 2..4 are shared by every group.
    fn new() -> Self {
        let items: Vec<Item> = (0..ITEMS).map(|_| Item::new()).collect();
        let singles = vec![
            SingleGroup::with_members(&items[0..4]),
            SingleGroup::with_members(&items[2..6]),
        ];
        let multis = vec![
            MultiGroup::with_members(&items[1..5]),
            MultiGroup::with_members(&items),
        ];
        Self {
            items,
            singles,
            multis,
        }
    }

    fn group(&self, g: usize) -> &dyn SelectionGroup {
        if g < 2 {
            &self.singles[g]
        } else {
            &self.multis[g - 2]
        }
    }

    fn apply(&self, op: &Op) {
        match op {
            Op::ItemSelect(i) => self.items[*i].select(),
            Op::ItemDeselect(i) => self.items[*i].deselect(),
            Op::ItemToggle(i) => self.items[*i].toggle(),
            Op::GroupSelect(g, i) => self.group(*g).select(&self.items[*i]),
            Op::GroupDeselect(g, i) => self.group(*g).deselect(&self.items[*i]),
            Op::SilentSelect(g, i) => self
                .group(*g)
                .select_with(&self.items[*i], &SelectOptions::silent()),
            Op::SelectAll(m) => self.multis[*m].select_all(),
            Op::DeselectAll(m) => self.multis[*m].deselect_all(),
            Op::ToggleAll(m) => self.multis[*m].toggle_select_all(),
            Op::Add(g, i) => {
                let group = self.group(*g);
                let item = &self.items[*i];
                let was_member = group.contains(item);
                assert_eq!(group.add(item).is_ok(), !was_member);
            }
            Op::Remove(g, i) => {
                let group = self.group(*g);
                let item = &self.items[*i];
                let was_member = group.contains(item);
                assert_eq!(group.remove(item).is_ok(), was_member);
            }
            Op::Reset(g, indices) => {
                let incoming: Vec<Item> = indices.iter().map(|i| self.items[*i].clone()).collect();
                assert!(self.group(*g).reset(&incoming).is_ok());
            }
        }
    }

    fn check(&self) -> Result<(), TestCaseError> {
        for single in &self.singles {
            let flagged: Vec<Item> = single
                .members()
                .into_iter()
                .filter(Item::is_selected)
                .collect();
            prop_assert!(flagged.len() <= 1, "two flagged members in {:?}", single);
            prop_assert_eq!(flagged.first().cloned(), single.selected());
        }
        for multi in &self.multis {
            let flagged: Vec<Item> = multi
                .members()
                .into_iter()
                .filter(Item::is_selected)
                .collect();
            prop_assert_eq!(&flagged, &multi.selected_items());
            prop_assert_eq!(multi.selected_count(), flagged.len());
            prop_assert_eq!(
                multi.aggregate(),
                Aggregate::classify(multi.selected_count(), multi.len())
            );
            if multi.is_empty() {
                prop_assert_eq!(multi.aggregate(), Aggregate::None);
            }
        }
        for item in &self.items {
            for g in 0..GROUPS {
                let group = self.group(g);
                prop_assert_eq!(
                    item.memberships().contains(&group.id()),
                    group.contains(item)
                );
            }
        }
        Ok(())
    }
}

proptest! {
    /// Property: group views and item flags agree after every operation.
    #[test]
    fn prop_groups_agree_with_items(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let world = World::new();
        world.check()?;
        for op in &ops {
            world.apply(op);
            world.check()?;
        }
    }

    /// Property: select on an already selected item never changes any state.
    #[test]
    fn prop_reselect_is_idempotent(
        setup in prop::collection::vec(op_strategy(), 0..20),
        target in 0..ITEMS,
    ) {
        let world = World::new();
        for op in &setup {
            world.apply(op);
        }
        let item = &world.items[target];
        item.select();

        let flags: Vec<bool> = world.items.iter().map(Item::is_selected).collect();
        let singles: Vec<Option<Item>> = world.singles.iter().map(SingleGroup::selected).collect();
        let counts: Vec<usize> = world.multis.iter().map(MultiGroup::selected_count).collect();

        item.select();

        prop_assert_eq!(flags, world.items.iter().map(Item::is_selected).collect::<Vec<_>>());
        prop_assert_eq!(singles, world.singles.iter().map(SingleGroup::selected).collect::<Vec<_>>());
        prop_assert_eq!(counts, world.multis.iter().map(MultiGroup::selected_count).collect::<Vec<_>>());
    }

    /// Property: an item removed from every group that held it ends up
    /// deselected.
    #[test]
    fn prop_orphans_are_deselected(
        setup in prop::collection::vec(op_strategy(), 0..20),
        target in 0..ITEMS,
    ) {
        let world = World::new();
        for op in &setup {
            world.apply(op);
        }
        let item = &world.items[target];
        let held = !item.memberships().is_empty();
        for g in 0..GROUPS {
            let group = world.group(g);
            if group.contains(item) {
                prop_assert!(group.remove(item).is_ok());
            }
        }
        prop_assert!(item.memberships().is_empty());
        if held {
            prop_assert!(!item.is_selected());
        }
        world.check()?;
    }
}
