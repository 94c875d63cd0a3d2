//! Raw and coalesced filesystem event types.

use std::path::PathBuf;

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

/// Kind of a raw filesystem notification, before debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Created,
    Removed,
    Renamed,
    Written,
    AttributeChanged,
}

impl RawEventKind {
    /// Map a notify event kind. Access events and unknown kinds are dropped.
    pub fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Remove(_) => Some(Self::Removed),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(Self::Created),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Renamed),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(Self::AttributeChanged),
            EventKind::Modify(_) => Some(Self::Written),
            EventKind::Any | EventKind::Access(_) | EventKind::Other => None,
        }
    }

    /// Fold a newer raw kind for the same path into the one already pending.
    ///
    /// Structural kinds (create, remove, rename) always replace. A write or
    /// attribute change after a create keeps the create, so a freshly created
    /// directory is still walked.
    pub fn merge(self, newer: RawEventKind) -> RawEventKind {
        match (self, newer) {
            (Self::Created, Self::Written | Self::AttributeChanged) => Self::Created,
            (_, newer) => newer,
        }
    }
}

/// Classification of a path once its debounce timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    /// Removed or renamed away.
    Removed,
    /// Written or attribute-changed.
    Modified,
}

impl ChangeKind {
    /// Classify the merged raw kind against the path's current existence.
    ///
    /// A path that no longer exists is always a removal. A path that exists
    /// after a remove or rename was recreated or moved in.
    pub fn classify(raw: RawEventKind, exists: bool) -> Self {
        if !exists {
            return Self::Removed;
        }
        match raw {
            RawEventKind::Created | RawEventKind::Removed | RawEventKind::Renamed => Self::Created,
            RawEventKind::Written | RawEventKind::AttributeChanged => Self::Modified,
        }
    }
}

/// A single event forwarded after a path's quiet period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncedEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
}
