#![forbid(unsafe_code)]

//! Test harness for selkit.
//!
//! - [`EventLog`]: subscribes to items and groups and records every event
//!   as one line of an ordered journal, so tests can assert exact event
//!   order across layers.
//! - [`capture_traces`]: runs a closure under a `tracing` registry and
//!   returns the spans and log messages the crate produced.
//!
//! # Journal format
//!
//! | Source | Line |
//! |--------|------|
//! | Item | `a:selected`, `a:deselected`, `a:reaffirmed` |
//! | Orphan cleanup | `a:deselected (orphaned)` |
//! | SingleGroup | `tabs:selected-one(a)`, `tabs:deselected-one(a)`, `tabs:reaffirmed-in-group(a)` |
//! | MultiGroup | `list:aggregate:some`, `list:reaffirmed-any(a,b)` |
//!
//! Items that were never named print as their [`ItemId`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use selkit::{
    Cause, EventContext, Item, ItemEvent, ItemId, MultiEvent, MultiGroup, SingleEvent,
    SingleGroup, SubscriptionScope,
};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

type Names = Rc<RefCell<HashMap<ItemId, String>>>;

fn display_name(names: &Names, item: &Item) -> String {
    names
        .borrow()
        .get(&item.id())
        .cloned()
        .unwrap_or_else(|| item.id().to_string())
}

/// Ordered journal of item and group events.
///
/// Subscriptions live as long as the log.
#[derive(Default)]
pub struct EventLog {
    entries: Rc<RefCell<Vec<String>>>,
    names: Names,
    scope: SubscriptionScope,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `item` a display name without recording its events.
    pub fn name_item(&mut self, name: &str, item: &Item) -> &mut Self {
        self.names.borrow_mut().insert(item.id(), name.to_string());
        self
    }

    /// Name `item` and record its events.
    pub fn watch_item(&mut self, name: &str, item: &Item) -> &mut Self {
        self.name_item(name, item);
        let entries = Rc::clone(&self.entries);
        let label = name.to_string();
        let sub = item.subscribe(move |event: &ItemEvent, ctx: &EventContext| {
            let kind = match event {
                ItemEvent::Selected(_) => "selected",
                ItemEvent::Deselected(_) => "deselected",
                ItemEvent::Reaffirmed(_) => "reaffirmed",
            };
            let suffix = if ctx.cause == Cause::Orphaned {
                " (orphaned)"
            } else {
                ""
            };
            entries.borrow_mut().push(format!("{label}:{kind}{suffix}"));
        });
        self.scope.hold(sub);
        self
    }

    /// Record the events of a single-select group under `name`.
    pub fn watch_single(&mut self, name: &str, group: &SingleGroup) -> &mut Self {
        let entries = Rc::clone(&self.entries);
        let names = Rc::clone(&self.names);
        let label = name.to_string();
        let sub = group.subscribe(move |event: &SingleEvent, _: &EventContext| {
            let (kind, item) = match event {
                SingleEvent::SelectedOne(item) => ("selected-one", item),
                SingleEvent::DeselectedOne(item) => ("deselected-one", item),
                SingleEvent::ReaffirmedInGroup(item) => ("reaffirmed-in-group", item),
            };
            let item = display_name(&names, item);
            entries.borrow_mut().push(format!("{label}:{kind}({item})"));
        });
        self.scope.hold(sub);
        self
    }

    /// Record the events of a multi-select group under `name`.
    pub fn watch_multi(&mut self, name: &str, group: &MultiGroup) -> &mut Self {
        let entries = Rc::clone(&self.entries);
        let names = Rc::clone(&self.names);
        let label = name.to_string();
        let sub = group.subscribe(move |event: &MultiEvent, _: &EventContext| {
            let line = match event {
                MultiEvent::Aggregate(aggregate) => {
                    format!("{label}:aggregate:{}", aggregate.as_str())
                }
                MultiEvent::ReaffirmedAny(items) => {
                    let items: Vec<String> =
                        items.iter().map(|item| display_name(&names, item)).collect();
                    format!("{label}:reaffirmed-any({})", items.join(","))
                }
            };
            entries.borrow_mut().push(line);
        });
        self.scope.hold(sub);
        self
    }

    /// Snapshot of the journal.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Return the journal and start a fresh one.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    /// Number of recorded lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Stop recording. Already recorded lines are kept.
    pub fn detach(&mut self) {
        self.scope.clear();
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("entries", &self.entries.borrow().len())
            .field("subscriptions", &self.scope.len())
            .finish()
    }
}

// ============================================================================
// Trace capture
// ============================================================================

/// Spans and log messages recorded by [`capture_traces`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traces {
    /// Names of spans opened, in order.
    pub spans: Vec<String>,
    /// `message` field of every event, in order.
    pub messages: Vec<String>,
}

impl Traces {
    /// Whether a span named `name` was opened.
    #[must_use]
    pub fn has_span(&self, name: &str) -> bool {
        self.spans.iter().any(|span| span == name)
    }

    /// Whether any message contains `needle`.
    #[must_use]
    pub fn has_message(&self, needle: &str) -> bool {
        self.messages.iter().any(|message| message.contains(needle))
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

struct CaptureLayer {
    traces: Arc<Mutex<Traces>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if let Ok(mut traces) = self.traces.lock() {
            traces.spans.push(attrs.metadata().name().to_string());
        }
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if let (Some(message), Ok(mut traces)) = (visitor.message, self.traces.lock()) {
            traces.messages.push(message);
        }
    }
}

/// Run `f` with a capturing `tracing` subscriber installed on this thread.
pub fn capture_traces<R>(f: impl FnOnce() -> R) -> (R, Traces) {
    let traces = Arc::new(Mutex::new(Traces::default()));
    let subscriber = tracing_subscriber::registry().with(CaptureLayer {
        traces: Arc::clone(&traces),
    });
    let result = tracing::subscriber::with_default(subscriber, f);
    let traces = match traces.lock() {
        Ok(traces) => traces.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    (result, traces)
}
