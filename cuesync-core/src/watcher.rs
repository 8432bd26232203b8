use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    commands::{Notifier, PlaylistEvent},
    item::{EntryKey, ItemError, ItemStatus, PlayableItem, QueueEntry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// One-shot readiness subscription handed to a [`PlayableItem`].
///
/// Resolving consumes the watch. Once the queue cancels it (the item left the
/// engine window or the engine was detached) resolving is a no-op.
#[derive(Debug)]
pub struct StatusWatch {
    id: WatchId,
    notifier: Notifier,
    cancelled: Arc<AtomicBool>,
}

impl StatusWatch {
    pub fn id(&self) -> WatchId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn resolve(self, outcome: Result<(), ItemError>) {
        if self.is_cancelled() {
            log::trace!("{} resolved after cancellation", self.id);
            return;
        }
        self.notifier.item_resolved(self.id, outcome);
    }

    pub fn ready(self) {
        self.resolve(Ok(()))
    }

    pub fn fail(self, error: ItemError) {
        self.resolve(Err(error))
    }
}

struct PendingWatch<I> {
    key: EntryKey,
    item: I,
    cancelled: Arc<AtomicBool>,
}

impl<I> PendingWatch<I> {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Tracks readiness subscriptions for the items loaded into the engine window
pub struct StatusWatcher<I> {
    pending: HashMap<WatchId, PendingWatch<I>>,
    next_id: u64,
    notifier: Notifier,
}

impl<I: PlayableItem> StatusWatcher<I> {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 0,
            notifier,
        }
    }

    /// Start watching an entry that just entered the window.
    ///
    /// Returns the event to emit right away when the item is already resolved.
    pub fn watch(&mut self, entry: &QueueEntry<I>) -> Option<PlaylistEvent<I>> {
        if self.is_watching(entry.key) {
            return None;
        }

        match entry.item.status() {
            ItemStatus::Ready => Some(PlaylistEvent::ItemOpened(entry.item.clone())),
            ItemStatus::Failed(error) => Some(PlaylistEvent::ItemFailed {
                item: entry.item.clone(),
                error,
            }),
            ItemStatus::Unknown => {
                self.subscribe(entry);
                None
            }
        }
    }

    /// Watch an entry that was already loaded before the watcher took over.
    ///
    /// Resolved items were reported when they were loaded, so only pending
    /// ones are subscribed.
    pub fn resume(&mut self, entry: &QueueEntry<I>) {
        if entry.item.status() == ItemStatus::Unknown && !self.is_watching(entry.key) {
            self.subscribe(entry);
        }
    }

    fn subscribe(&mut self, entry: &QueueEntry<I>) {
        let id = WatchId(self.next_id);
        self.next_id += 1;
        let cancelled = Arc::new(AtomicBool::new(false));
        self.pending.insert(
            id,
            PendingWatch {
                key: entry.key,
                item: entry.item.clone(),
                cancelled: Arc::clone(&cancelled),
            },
        );
        log::debug!("Watching {} for entry {}", id, entry.key);
        entry.item.subscribe(StatusWatch {
            id,
            notifier: self.notifier.clone(),
            cancelled,
        });
    }

    /// Turn a resolved watch into its event, unless it was cancelled meanwhile
    pub fn resolve(&mut self, id: WatchId, outcome: Result<(), ItemError>) -> Option<PlaylistEvent<I>> {
        let Some(watch) = self.pending.remove(&id) else {
            log::debug!("Ignoring resolution of inactive {}", id);
            return None;
        };
        Some(match outcome {
            Ok(()) => PlaylistEvent::ItemOpened(watch.item),
            Err(error) => PlaylistEvent::ItemFailed {
                item: watch.item,
                error,
            },
        })
    }

    /// Cancel every watch whose entry is no longer in the window
    pub fn retain_window(&mut self, window: &[EntryKey]) {
        self.pending.retain(|id, watch| {
            let keep = window.contains(&watch.key);
            if !keep {
                log::debug!("Cancelling {} for entry {}", id, watch.key);
                watch.cancel();
            }
            keep
        });
    }

    pub fn cancel_all(&mut self) {
        for watch in self.pending.values() {
            watch.cancel();
        }
        self.pending.clear();
    }

    pub fn is_watching(&self, key: EntryKey) -> bool {
        self.pending.values().any(|watch| watch.key == key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
