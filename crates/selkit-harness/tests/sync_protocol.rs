#![forbid(unsafe_code)]

//! Integration tests: propagation of selection changes between items and the
//! groups that hold them.

use std::cell::RefCell;
use std::rc::Rc;

use selkit::{
    Item, ItemEvent, Metadata, MultiGroup, Ownership, SelectOptions, SingleEvent, SingleGroup,
};
use selkit_harness::EventLog;

// ============================================================================
// Ownership
// ============================================================================

#[test]
fn ownership_follows_membership_count() {
    let x = Item::new();
    assert_eq!(x.ownership(), Ownership::Standalone);

    let a = SingleGroup::with_members(&[x.clone()]);
    assert_eq!(x.ownership(), Ownership::Direct);

    let b = MultiGroup::with_members(&[x.clone()]);
    assert_eq!(x.ownership(), Ownership::Shared);
    assert_eq!(x.memberships(), vec![a.id(), b.id()]);

    a.remove(&x).expect("remove");
    assert_eq!(x.ownership(), Ownership::Direct);
}

// ============================================================================
// Entry points
// ============================================================================

#[test]
fn select_through_item_reaches_every_group_once() {
    let x = Item::new();
    let y = Item::new();
    let a = SingleGroup::with_members(&[x.clone(), y.clone()]);
    let b = MultiGroup::with_members(&[x.clone(), y.clone()]);
    let mut log = EventLog::new();
    log.watch_item("x", &x)
        .watch_item("y", &y)
        .watch_single("A", &a)
        .watch_multi("B", &b);

    x.select();

    assert_eq!(a.selected(), Some(x.clone()));
    assert_eq!(b.selected_items(), vec![x.clone()]);
    assert_eq!(
        log.entries(),
        vec!["A:selected-one(x)", "B:aggregate:some", "x:selected"]
    );
}

#[test]
fn select_through_group_emits_item_event_before_group_event() {
    let x = Item::new();
    let y = Item::new();
    let a = SingleGroup::with_members(&[x.clone(), y.clone()]);
    let b = MultiGroup::with_members(&[x.clone(), y.clone()]);
    let mut log = EventLog::new();
    log.watch_item("x", &x)
        .watch_single("A", &a)
        .watch_multi("B", &b);

    a.select(&x);

    assert_eq!(
        log.entries(),
        vec!["B:aggregate:some", "x:selected", "A:selected-one(x)"]
    );
}

#[test]
fn item_observer_sees_consistent_groups() {
    let x = Item::new();
    let a = SingleGroup::with_members(&[x.clone()]);
    let b = MultiGroup::with_members(&[x.clone(), Item::new()]);
    let checks = Rc::new(RefCell::new(Vec::new()));

    let c = Rc::clone(&checks);
    let (probe_a, probe_b, probe_x) = (a.clone(), b.clone(), x.clone());
    let _sub = x.subscribe(move |event, _| {
        if let ItemEvent::Selected(_) = event {
            c.borrow_mut().push((
                probe_a.selected() == Some(probe_x.clone()),
                probe_b.selected_items().contains(&probe_x),
            ));
        }
    });

    b.select(&x);

    assert_eq!(*checks.borrow(), vec![(true, true)]);
}

// ============================================================================
// Shared items
// ============================================================================

#[test]
fn two_multi_groups_sharing_an_item_both_count_it() {
    let x = Item::new();
    let y = Item::new();
    let a = MultiGroup::with_members(&[x.clone(), y.clone()]);
    let b = MultiGroup::with_members(&[x.clone()]);
    let mut log = EventLog::new();
    log.watch_item("x", &x)
        .watch_multi("A", &a)
        .watch_multi("B", &b);

    a.select(&x);

    assert!(x.is_selected());
    assert_eq!(a.selected_count(), 1);
    assert_eq!(b.selected_count(), 1);
    assert_eq!(
        log.entries(),
        vec!["B:aggregate:all", "x:selected", "A:aggregate:some"]
    );
}

#[test]
fn selecting_in_one_single_group_clears_the_other() {
    let x = Item::new();
    let y = Item::new();
    let z = Item::new();
    let s1 = SingleGroup::with_members(&[x.clone(), z.clone()]);
    let s2 = SingleGroup::with_members(&[x.clone(), y.clone()]);
    x.select();

    let mut log = EventLog::new();
    log.watch_item("x", &x)
        .watch_item("y", &y)
        .watch_single("S1", &s1)
        .watch_single("S2", &s2);

    y.select();

    assert!(!x.is_selected());
    assert_eq!(s1.selected(), None);
    assert_eq!(s2.selected(), Some(y.clone()));
    assert_eq!(
        log.entries(),
        vec![
            "S1:deselected-one(x)",
            "x:deselected",
            "S2:deselected-one(x)",
            "S2:selected-one(y)",
            "y:selected",
        ]
    );
}

#[test]
fn no_observer_sees_two_selected_members() {
    let x = Item::new();
    let y = Item::new();
    let group = SingleGroup::with_members(&[x.clone(), y.clone()]);
    let other = MultiGroup::with_members(&[x.clone(), y.clone()]);
    let violations = Rc::new(RefCell::new(0));

    let mut scope = selkit::SubscriptionScope::new();
    for item in [&x, &y] {
        let v = Rc::clone(&violations);
        let (px, py) = (x.clone(), y.clone());
        scope.hold(item.subscribe(move |_, _| {
            if px.is_selected() && py.is_selected() {
                *v.borrow_mut() += 1;
            }
        }));
    }
    let v = Rc::clone(&violations);
    let (px, py) = (x.clone(), y.clone());
    scope.hold(group.subscribe(move |_, _| {
        if px.is_selected() && py.is_selected() {
            *v.borrow_mut() += 1;
        }
    }));

    x.select();
    group.select(&y);
    other.select(&x);
    y.select();
    other.select_all();

    assert_eq!(*violations.borrow(), 0);
}

// ============================================================================
// Reselect
// ============================================================================

#[test]
fn reselect_through_item_reaffirms_in_single_group() {
    let x = Item::new();
    let a = SingleGroup::with_members(&[x.clone()]);
    a.select(&x);
    let mut log = EventLog::new();
    log.watch_item("x", &x).watch_single("A", &a);

    x.select();

    assert_eq!(a.selected(), Some(x.clone()));
    assert_eq!(log.entries(), vec!["A:reaffirmed-in-group(x)", "x:reaffirmed"]);
}

#[test]
fn reselect_of_shared_item_reaffirms_everywhere_once() {
    let x = Item::new();
    let s = SingleGroup::with_members(&[x.clone()]);
    let m1 = MultiGroup::with_members(&[x.clone(), Item::new()]);
    let m2 = MultiGroup::with_members(&[x.clone()]);
    x.select();

    let mut log = EventLog::new();
    log.watch_item("x", &x)
        .watch_single("S", &s)
        .watch_multi("M1", &m1)
        .watch_multi("M2", &m2);

    m1.select(&x);

    assert_eq!(
        log.take(),
        vec![
            "S:reaffirmed-in-group(x)",
            "M2:reaffirmed-any(x)",
            "x:reaffirmed",
            "M1:reaffirmed-any(x)",
        ]
    );

    x.select();
    assert_eq!(
        log.take(),
        vec![
            "S:reaffirmed-in-group(x)",
            "M1:reaffirmed-any(x)",
            "M2:reaffirmed-any(x)",
            "x:reaffirmed",
        ]
    );
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn silent_select_through_group_is_silent_everywhere() {
    let x = Item::new();
    let y = Item::new();
    let a = SingleGroup::with_members(&[x.clone(), y.clone()]);
    let b = MultiGroup::with_members(&[x.clone(), y.clone()]);
    y.select();
    let mut log = EventLog::new();
    log.watch_item("x", &x)
        .watch_item("y", &y)
        .watch_single("A", &a)
        .watch_multi("B", &b);

    a.select_with(&x, &SelectOptions::silent());

    assert!(x.is_selected());
    assert!(!y.is_selected());
    assert_eq!(b.selected_items(), vec![x.clone()]);
    assert!(log.is_empty());
}

#[test]
fn metadata_reaches_every_event_of_the_call() {
    let x = Item::new();
    let y = Item::new();
    let a = SingleGroup::with_members(&[x.clone(), y.clone()]);
    let b = MultiGroup::with_members(&[x.clone()]);
    y.select();

    let meta = Metadata::new("keyboard".to_string());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut scope = selkit::SubscriptionScope::new();
    for item in [&x, &y] {
        let s = Rc::clone(&seen);
        let m = meta.clone();
        scope.hold(item.subscribe(move |_, ctx| {
            s.borrow_mut()
                .push(ctx.metadata.as_ref().is_some_and(|got| got.ptr_eq(&m)));
        }));
    }
    let s = Rc::clone(&seen);
    let m = meta.clone();
    scope.hold(a.subscribe(move |_, ctx| {
        s.borrow_mut()
            .push(ctx.metadata.as_ref().is_some_and(|got| got.ptr_eq(&m)));
    }));
    let s = Rc::clone(&seen);
    let m = meta.clone();
    scope.hold(b.subscribe(move |_, ctx| {
        s.borrow_mut()
            .push(ctx.metadata.as_ref().is_some_and(|got| got.ptr_eq(&m)));
    }));

    a.select_with(&x, &SelectOptions::default().with_metadata(meta.clone()));

    // y deselected (item + group), x selected (item), B aggregate, A selected.
    assert_eq!(seen.borrow().len(), 5);
    assert!(seen.borrow().iter().all(|carried| *carried));
}

// ============================================================================
// Re-entrancy and disposal
// ============================================================================

#[test]
fn observer_may_redirect_selection() {
    let x = Item::new();
    let y = Item::new();
    let group = SingleGroup::with_members(&[x.clone(), y.clone()]);
    let redirect = group.clone();
    let target = y.clone();
    let _sub = group.subscribe(move |event, _| {
        if let SingleEvent::SelectedOne(item) = event {
            if *item != target {
                redirect.select(&target);
            }
        }
    });

    x.select();

    assert!(!x.is_selected());
    assert!(y.is_selected());
    assert_eq!(group.selected(), Some(y));
}

#[test]
fn closed_group_no_longer_reacts() {
    let x = Item::new();
    let a = SingleGroup::with_members(&[x.clone()]);
    let b = MultiGroup::with_members(&[x.clone()]);
    let mut log = EventLog::new();
    log.watch_single("A", &a).watch_multi("B", &b);

    a.close();
    x.select();

    assert_eq!(a.selected(), None);
    assert_eq!(x.memberships(), vec![b.id()]);
    assert_eq!(log.entries(), vec!["B:aggregate:all"]);
}

#[test]
fn dropped_group_no_longer_reacts() {
    let x = Item::new();
    let b = MultiGroup::with_members(&[x.clone()]);
    {
        let _a = SingleGroup::with_members(&[x.clone()]);
        assert_eq!(x.ownership(), Ownership::Shared);
    }
    assert_eq!(x.ownership(), Ownership::Direct);
    x.select();
    assert_eq!(b.selected_count(), 1);
}

#[test]
fn group_closed_mid_fan_out_is_skipped() {
    let x = Item::new();
    let y = Item::new();
    let a = SingleGroup::with_members(&[x.clone()]);
    let b = MultiGroup::with_members(&[x.clone(), y.clone()]);
    let mut log = EventLog::new();
    log.watch_item("x", &x)
        .watch_single("A", &a)
        .watch_multi("B", &b);

    let closer = b.clone();
    let _sub = a.subscribe(move |event, _| {
        if let SingleEvent::SelectedOne(_) = event {
            closer.close();
        }
    });

    x.select();

    assert!(x.is_selected());
    assert!(b.is_closed());
    assert_eq!(b.selected_count(), 0);
    assert_eq!(a.selected(), Some(x.clone()));
    assert_eq!(x.memberships(), vec![a.id()]);
    assert_eq!(log.entries(), vec!["A:selected-one(x)", "x:selected"]);
}

#[test]
fn item_removed_mid_fan_out_is_skipped() {
    let x = Item::new();
    let y = Item::new();
    let a = SingleGroup::with_members(&[x.clone()]);
    let b = MultiGroup::with_members(&[x.clone(), y.clone()]);
    let mut log = EventLog::new();
    log.watch_item("x", &x)
        .watch_single("A", &a)
        .watch_multi("B", &b);

    let (leaver, departing) = (b.clone(), x.clone());
    let _sub = a.subscribe(move |event, _| {
        if let SingleEvent::SelectedOne(_) = event {
            leaver.remove(&departing).expect("remove");
        }
    });

    x.select();

    assert!(x.is_selected());
    assert_eq!(b.members(), vec![y.clone()]);
    assert_eq!(b.selected_count(), 0);
    assert_eq!(x.memberships(), vec![a.id()]);
    assert_eq!(log.entries(), vec!["A:selected-one(x)", "x:selected"]);
}

#[test]
fn group_closed_mid_deselect_fan_out_is_skipped() {
    let x = Item::new();
    let a = SingleGroup::with_members(&[x.clone()]);
    let b = MultiGroup::with_members(&[x.clone(), Item::new()]);
    x.select();

    let closer = b.clone();
    let _sub = a.subscribe(move |event, _| {
        if let SingleEvent::DeselectedOne(_) = event {
            closer.close();
        }
    });

    x.deselect();

    assert!(!x.is_selected());
    assert!(b.is_closed());
    assert_eq!(a.selected(), None);
}
