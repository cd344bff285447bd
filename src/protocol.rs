//! Event-bus protocol shared by the setlist session, the lookup worker and the
//! shell.
//!
//! Player callbacks and lookup results carry the generation of the mount that
//! requested them so late deliveries can be discarded.

use uuid::Uuid;

use crate::drag::{PointerKind, PointerPoint};
use crate::player::PlaybackState;
use crate::reference_labels::{LookupTitle, ReferenceLabel};
use crate::setlist::ItemKey;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Setlist(SetlistMessage),
    Playback(PlaybackMessage),
    Reference(ReferenceMessage),
    Session(SessionMessage),
}

/// One rendered setlist row.
#[derive(Debug, Clone, PartialEq)]
pub struct SetlistRow {
    pub key: ItemKey,
    pub title: String,
    /// `" (n)"` for repeated songs, otherwise empty.
    pub duplicate_label: String,
    pub selected_variant_key: String,
    pub selected_reference_url: String,
    pub is_bound: bool,
}

/// Setlist-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum SetlistMessage {
    RemoveEntry(usize),
    PointerDown {
        index: usize,
        kind: PointerKind,
        point: PointerPoint,
    },
    PointerMove {
        /// Row currently under the pointer, if any.
        over_index: Option<usize>,
        point: PointerPoint,
    },
    PointerUp,
    PointerCancel,
    /// Released on a grab affordance without dragging.
    RowTapped(usize),
    SelectVariant {
        song_id: String,
        variant_key: String,
    },
    SelectReference {
        song_id: String,
        url: String,
    },
    SaveRequested,
    /// Full row snapshot after any change to order, membership or selection.
    RowsChanged(Vec<SetlistRow>),
    Saved {
        setlist_id: String,
        rows: usize,
    },
}

/// Embedded player commands and callbacks.
#[derive(Debug, Clone)]
pub enum PlaybackMessage {
    /// Play/pause request for the row at this index. Debounced.
    TogglePlay(usize),
    ToggleMute,
    Seek(f64),
    PlayerReady {
        generation: Uuid,
    },
    PlayerStateChanged {
        generation: Uuid,
        code: i32,
    },
    PlayerError {
        generation: Uuid,
        code: i32,
    },
    Progress {
        generation: Uuid,
        current_time_seconds: f64,
        duration_seconds: f64,
    },
    StateChanged(PlaybackState),
}

/// Reference label resolution traffic.
#[derive(Debug, Clone)]
pub enum ReferenceMessage {
    /// Selector opened for a song.
    LabelsRequested {
        song_id: String,
    },
    /// Handed to the lookup worker.
    LookupRequested {
        generation: Uuid,
        song_id: String,
        urls: Vec<String>,
    },
    LookupFinished {
        generation: Uuid,
        song_id: String,
        urls: Vec<String>,
        result: Result<Vec<LookupTitle>, String>,
    },
    LabelsResolved {
        song_id: String,
        labels: Vec<ReferenceLabel>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// User-facing message produced from a recoverable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Session lifecycle and timing.
#[derive(Debug, Clone)]
pub enum SessionMessage {
    /// Periodic wake-up for debounce deadlines, touch activation and progress.
    Tick,
    Notification(Notification),
    Unmount,
}

/// Persisted setlist row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedEntry {
    pub song_id: String,
    pub position: usize,
    pub selected_variant_key: String,
    pub selected_reference_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetlistInfo {
    pub id: String,
    pub name: String,
}
