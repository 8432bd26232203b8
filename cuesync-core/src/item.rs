use std::fmt;

use thiserror::Error;

use crate::watcher::StatusWatch;

/// Why a playable item could not be opened
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error("failed to open item: {0}")]
    Open(String),
    #[error("unsupported media: {0}")]
    Unsupported(String),
}

/// Readiness of a playable item
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemStatus {
    #[default]
    Unknown,
    Ready,
    Failed(ItemError),
}

impl ItemStatus {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ItemStatus::Unknown)
    }
}

/// A unit of media the playback engine can load.
///
/// Implementors report their current readiness and accept a one-shot
/// [`StatusWatch`] that they must resolve (from any thread) once the item
/// becomes ready or fails. A watch that is never resolved simply never fires.
pub trait PlayableItem: Clone + fmt::Debug {
    fn status(&self) -> ItemStatus;

    fn subscribe(&self, watch: StatusWatch);
}

/// Identity of one playlist position.
///
/// Items may repeat by value, so the queue and the engine track positions by
/// key rather than by item equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey(pub(crate) u64);

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A playlist item together with the key of the position it occupies
#[derive(Debug, Clone)]
pub struct QueueEntry<I> {
    pub key: EntryKey,
    pub item: I,
}

impl<I> QueueEntry<I> {
    pub fn new(key: EntryKey, item: I) -> Self {
        Self { key, item }
    }
}
