#![forbid(unsafe_code)]

//! Public events emitted by items and groups.

use crate::item::Item;

/// Events emitted by an [`Item`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemEvent {
    /// The item went from deselected to selected.
    Selected(Item),
    /// The item went from selected to deselected.
    Deselected(Item),
    /// `select` was called on an already selected item.
    Reaffirmed(Item),
}

impl ItemEvent {
    /// The item the event is about.
    #[must_use]
    pub fn item(&self) -> &Item {
        match self {
            Self::Selected(item) | Self::Deselected(item) | Self::Reaffirmed(item) => item,
        }
    }
}

/// Events emitted by a [`SingleGroup`](crate::SingleGroup).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SingleEvent {
    /// A new member became the selected one.
    SelectedOne(Item),
    /// The selected member was deselected; nothing is selected now.
    DeselectedOne(Item),
    /// The already selected member was selected again.
    ReaffirmedInGroup(Item),
}

impl SingleEvent {
    /// The member the event is about.
    #[must_use]
    pub fn item(&self) -> &Item {
        match self {
            Self::SelectedOne(item) | Self::DeselectedOne(item) | Self::ReaffirmedInGroup(item) => {
                item
            }
        }
    }
}

/// How much of a [`MultiGroup`](crate::MultiGroup) is selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Aggregate {
    /// Nothing selected, or the group is empty.
    None,
    /// Some but not all members selected.
    Some,
    /// Every member selected (never reported for an empty group).
    All,
}

impl Aggregate {
    /// Bucket a selected count against the group's total membership.
    #[must_use]
    pub const fn classify(selected: usize, total: usize) -> Self {
        if selected == 0 || total == 0 {
            Self::None
        } else if selected >= total {
            Self::All
        } else {
            Self::Some
        }
    }

    /// Stable lowercase name: `"none"`, `"some"`, or `"all"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Some => "some",
            Self::All => "all",
        }
    }
}

/// Events emitted by a [`MultiGroup`](crate::MultiGroup).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MultiEvent {
    /// The aggregate bucket changed to the carried value.
    Aggregate(Aggregate),
    /// Members that were selected again while already selected.
    ReaffirmedAny(Vec<Item>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_buckets() {
        assert_eq!(Aggregate::classify(0, 3), Aggregate::None);
        assert_eq!(Aggregate::classify(1, 3), Aggregate::Some);
        assert_eq!(Aggregate::classify(3, 3), Aggregate::All);
    }

    #[test]
    fn empty_group_is_never_all() {
        assert_eq!(Aggregate::classify(0, 0), Aggregate::None);
    }

    #[test]
    fn event_item_accessors() {
        let item = Item::new();
        assert_eq!(ItemEvent::Reaffirmed(item.clone()).item(), &item);
        assert_eq!(SingleEvent::DeselectedOne(item.clone()).item(), &item);
        assert_eq!(Aggregate::Some.as_str(), "some");
    }
}
