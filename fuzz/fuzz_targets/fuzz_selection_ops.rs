//! Fuzz target for arbitrary selection and membership sequences.
//!
//! Drives a fixed pool of items through single- and multi-select groups with
//! overlapping membership and checks after every step that the group views
//! agree with the item flags.
//!
//! ## Running
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_selection_ops
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use selkit::{Aggregate, Item, MultiGroup, SelectOptions, SelectionGroup, SingleGroup};

const ITEMS: usize = 8;

#[derive(Debug, arbitrary::Arbitrary)]
enum Op {
    ItemSelect(u8),
    ItemDeselect(u8),
    ItemToggle(u8),
    GroupSelect { group: u8, item: u8, silent: bool },
    GroupDeselect { group: u8, item: u8 },
    SelectAll { group: u8, silent: bool },
    DeselectAll(u8),
    ToggleAll(u8),
    Add { group: u8, item: u8 },
    Remove { group: u8, item: u8 },
    Reset { group: u8, mask: u8 },
    Close(u8),
}

#[derive(Debug, arbitrary::Arbitrary)]
struct FuzzInput {
    /// Initial membership bitmask per group.
    layout: [u8; 4],
    ops: Vec<Op>,
}

struct World {
    items: Vec<Item>,
    singles: [SingleGroup; 2],
    multis: [MultiGroup; 2],
}

impl World {
    fn new(layout: [u8; 4]) -> Self {
        let items: Vec<Item> = (0..ITEMS).map(|_| Item::new()).collect();
        let pick = |mask: u8| -> Vec<Item> {
            items
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, item)| item.clone())
                .collect()
        };
        let singles = [
            SingleGroup::with_members(&pick(layout[0])),
            SingleGroup::with_members(&pick(layout[1])),
        ];
        let multis = [
            MultiGroup::with_members(&pick(layout[2])),
            MultiGroup::with_members(&pick(layout[3])),
        ];
        Self {
            items,
            singles,
            multis,
        }
    }

    fn item(&self, index: u8) -> &Item {
        &self.items[index as usize % ITEMS]
    }

    fn group(&self, index: u8) -> &dyn SelectionGroup {
        match index % 4 {
            0 => &self.singles[0],
            1 => &self.singles[1],
            2 => &self.multis[0],
            _ => &self.multis[1],
        }
    }

    fn multi(&self, index: u8) -> &MultiGroup {
        &self.multis[index as usize % 2]
    }

    fn apply(&self, op: &Op) {
        let options = |silent: bool| {
            if silent {
                SelectOptions::silent()
            } else {
                SelectOptions::default()
            }
        };
        match *op {
            Op::ItemSelect(i) => self.item(i).select(),
            Op::ItemDeselect(i) => self.item(i).deselect(),
            Op::ItemToggle(i) => self.item(i).toggle(),
            Op::GroupSelect { group, item, silent } => {
                self.group(group).select_with(self.item(item), &options(silent));
            }
            Op::GroupDeselect { group, item } => self.group(group).deselect(self.item(item)),
            Op::SelectAll { group, silent } => self.multi(group).select_all_with(&options(silent)),
            Op::DeselectAll(group) => self.multi(group).deselect_all(),
            Op::ToggleAll(group) => self.multi(group).toggle_select_all(),
            Op::Add { group, item } => {
                let _ = self.group(group).add(self.item(item));
            }
            Op::Remove { group, item } => {
                let _ = self.group(group).remove(self.item(item));
            }
            Op::Reset { group, mask } => {
                let incoming: Vec<Item> = (0..ITEMS)
                    .filter(|i| mask & (1 << i) != 0)
                    .map(|i| self.items[i].clone())
                    .collect();
                let _ = self.group(group).reset(&incoming);
            }
            Op::Close(group) => self.group(group).close(),
        }
    }

    fn check(&self) {
        for single in &self.singles {
            let flagged: Vec<Item> = single
                .members()
                .into_iter()
                .filter(Item::is_selected)
                .collect();
            assert!(flagged.len() <= 1);
            assert_eq!(flagged.first().cloned(), single.selected());
        }
        for multi in &self.multis {
            let flagged: Vec<Item> = multi
                .members()
                .into_iter()
                .filter(Item::is_selected)
                .collect();
            assert_eq!(flagged, multi.selected_items());
            assert_eq!(
                multi.aggregate(),
                Aggregate::classify(flagged.len(), multi.len())
            );
        }
        for item in &self.items {
            for g in 0..4 {
                let group = self.group(g);
                assert_eq!(item.memberships().contains(&group.id()), group.contains(item));
            }
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let world = World::new(input.layout);
    world.check();
    for op in input.ops.iter().take(256) {
        world.apply(op);
        world.check();
    }
});
