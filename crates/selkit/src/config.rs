#![forbid(unsafe_code)]

//! Configuration for items and groups.

/// Per-item configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemConfig {
    /// Emit [`ItemEvent::Deselected`](crate::ItemEvent::Deselected) when the
    /// item loses its last group and its flag is cleared.
    ///
    /// The event carries [`Cause::Orphaned`](crate::Cause::Orphaned) either
    /// way; turning this off hides the cleanup from observers entirely.
    pub announce_orphaning: bool,
}

impl Default for ItemConfig {
    fn default() -> Self {
        Self {
            announce_orphaning: true,
        }
    }
}

impl ItemConfig {
    /// Set whether orphan cleanup emits a deselected event.
    #[must_use]
    pub fn with_announce_orphaning(mut self, announce: bool) -> Self {
        self.announce_orphaning = announce;
        self
    }
}

/// Per-group configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupConfig {
    /// Human-readable name used in `Debug` output and logs.
    pub label: Option<String>,
}

impl GroupConfig {
    /// Set the group label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
