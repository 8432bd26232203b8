use crossbeam_channel::Sender;

use crate::{
    item::{EntryKey, ItemError},
    watcher::WatchId,
};

/// A mutation of the playlist
#[derive(Debug, Clone)]
pub enum PlaylistChange<I> {
    /// Insert items so that the first lands at `index`
    Insert { index: usize, items: Vec<I> },
    /// Remove `count` items starting at `index`
    Remove { index: usize, count: usize },
    /// Overwrite the slots starting at `index` with `items`
    Replace { index: usize, items: Vec<I> },
    /// Drop every item
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Remove,
    Replace,
    Reset,
}

impl<I> PlaylistChange<I> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            PlaylistChange::Insert { .. } => ChangeKind::Insert,
            PlaylistChange::Remove { .. } => ChangeKind::Remove,
            PlaylistChange::Replace { .. } => ChangeKind::Replace,
            PlaylistChange::Reset => ChangeKind::Reset,
        }
    }
}

/// Events sent from the queue to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistEvent<I> {
    /// The active item changed. `old == new` when an item was restarted.
    CurrentItemChanged { old: Option<I>, new: Option<I> },
    /// An item in the engine window finished loading
    ItemOpened(I),
    /// An item in the engine window failed to load
    ItemFailed { item: I, error: ItemError },
}

/// Notifications posted to the queue's mailbox by engines and items
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    /// The engine's active item changed on its own (or as an echo of a call)
    ActiveItemChanged {
        old: Option<EntryKey>,
        new: Option<EntryKey>,
    },
    /// A watched item resolved its readiness
    ItemResolved {
        watch: WatchId,
        outcome: Result<(), ItemError>,
    },
}

/// Cloneable sender for the queue's mailbox, usable from any thread
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<EngineNotification>,
}

impl Notifier {
    pub(crate) fn new(tx: Sender<EngineNotification>) -> Self {
        Self { tx }
    }

    pub fn active_item_changed(&self, old: Option<EntryKey>, new: Option<EntryKey>) {
        self.post(EngineNotification::ActiveItemChanged { old, new });
    }

    pub fn item_resolved(&self, watch: WatchId, outcome: Result<(), ItemError>) {
        self.post(EngineNotification::ItemResolved { watch, outcome });
    }

    fn post(&self, notification: EngineNotification) {
        if self.tx.send(notification).is_err() {
            log::trace!("Queue mailbox closed, dropping notification");
        }
    }
}
