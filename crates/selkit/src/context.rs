#![forbid(unsafe_code)]

//! Per-call options, the event context handed to observers, and the
//! operation marker threaded through one propagation chain.
//!
//! # Invariants
//!
//! 1. An [`OpContext`] lives exactly as long as the external call that
//!    created it. It is never stored on an item or a group.
//! 2. A participant recorded in an [`OpContext`] is never asked to process
//!    the same select operation a second time.
//! 3. [`Emission::downstream`] never turns a suppressed chain back on:
//!    `Suppressed` stays `Suppressed` for every hop.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use ahash::AHashSet;

use crate::id::Participant;

/// Opaque caller-supplied payload passed unchanged to every event of one
/// operation.
///
/// # Example
///
/// ```
/// use selkit::Metadata;
///
/// let meta = Metadata::new("from-keyboard");
/// assert_eq!(meta.downcast_ref::<&str>(), Some(&"from-keyboard"));
/// assert!(meta.downcast_ref::<u32>().is_none());
/// ```
#[derive(Clone)]
pub struct Metadata(Rc<dyn Any>);

impl Metadata {
    /// Wrap any `'static` value.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Borrow the payload as `T`, if that is what it holds.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether two metadata handles share the same payload.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Metadata(..)")
    }
}

/// Options recognized by every public selection operation.
#[derive(Clone, Debug, Default)]
pub struct SelectOptions {
    /// Perform the state change without emitting any event, at any layer.
    pub silent: bool,
    /// Payload forwarded to every event of the operation.
    pub metadata: Option<Metadata>,
}

impl SelectOptions {
    /// Options that suppress every event of the operation.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            silent: true,
            metadata: None,
        }
    }

    /// Attach caller metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub(crate) fn emission(&self) -> Emission {
        if self.silent {
            Emission::Suppressed
        } else {
            Emission::Emit
        }
    }
}

/// Why an item was deselected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cause {
    /// Somebody asked for the change (an item, a group, or a bulk operation).
    #[default]
    Requested,
    /// The item lost its last group membership and its flag was cleared.
    Orphaned,
}

/// Context delivered with every event.
#[derive(Clone, Debug, Default)]
pub struct EventContext {
    /// What triggered the event.
    pub cause: Cause,
    /// Caller metadata from [`SelectOptions::metadata`].
    pub metadata: Option<Metadata>,
}

/// How one hop of a propagation chain treats its own events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Emission {
    /// Emit this hop's events and let later hops emit theirs.
    Emit,
    /// Stay quiet at this hop; later hops emit.
    PropagateOnly,
    /// Quiet at this hop and every later one.
    Suppressed,
}

impl Emission {
    #[inline]
    pub(crate) fn emits(self) -> bool {
        self == Self::Emit
    }

    /// The emission handed to the next participant in the chain.
    #[inline]
    pub(crate) fn downstream(self) -> Self {
        match self {
            Self::Emit | Self::PropagateOnly => Self::Emit,
            Self::Suppressed => Self::Suppressed,
        }
    }

    /// Quiet this hop while keeping the downstream behavior.
    #[inline]
    pub(crate) fn hushed(self) -> Self {
        match self {
            Self::Emit | Self::PropagateOnly => Self::PropagateOnly,
            Self::Suppressed => Self::Suppressed,
        }
    }
}

/// Operation marker: the scoped state of one external selection call.
#[derive(Debug)]
pub(crate) struct OpContext {
    processed: AHashSet<Participant>,
    metadata: Option<Metadata>,
    cause: Cause,
    quiet_reaffirm: bool,
}

impl OpContext {
    pub(crate) fn new(options: &SelectOptions) -> Self {
        Self {
            processed: AHashSet::new(),
            metadata: options.metadata.clone(),
            cause: Cause::Requested,
            quiet_reaffirm: false,
        }
    }

    /// A context whose reaffirm events are muted for the whole chain.
    ///
    /// Used when a group adopts an item that is already selected.
    pub(crate) fn adopting() -> Self {
        Self {
            quiet_reaffirm: true,
            ..Self::new(&SelectOptions::default())
        }
    }

    /// A context for clearing the flag of an orphaned item.
    pub(crate) fn orphaning() -> Self {
        Self {
            cause: Cause::Orphaned,
            ..Self::new(&SelectOptions::default())
        }
    }

    /// A sibling context for one member of a bulk operation.
    ///
    /// Shares metadata and flags but starts with an empty marker, so each
    /// member is its own logical operation.
    pub(crate) fn fork(&self) -> Self {
        Self {
            processed: AHashSet::new(),
            metadata: self.metadata.clone(),
            cause: self.cause,
            quiet_reaffirm: self.quiet_reaffirm,
        }
    }

    #[inline]
    pub(crate) fn is_processed(&self, participant: Participant) -> bool {
        self.processed.contains(&participant)
    }

    #[inline]
    pub(crate) fn mark(&mut self, participant: Participant) {
        self.processed.insert(participant);
    }

    #[inline]
    pub(crate) fn quiet_reaffirm(&self) -> bool {
        self.quiet_reaffirm
    }

    #[inline]
    pub(crate) fn cause(&self) -> Cause {
        self.cause
    }

    pub(crate) fn event_context(&self) -> EventContext {
        EventContext {
            cause: self.cause,
            metadata: self.metadata.clone(),
        }
    }
}
