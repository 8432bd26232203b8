use std::collections::VecDeque;

use crate::{
    commands::Notifier,
    item::{EntryKey, QueueEntry},
};

/// The windowed playback engine the queue drives.
///
/// The engine only knows the short run of entries loaded into it. Its first
/// entry is the active one; advancing or removing the active entry makes the
/// following entry active. Implementations report spontaneous changes of the
/// active entry through a [`Notifier`].
pub trait QueueEngine<I> {
    /// Insert `entry` right after `anchor`, or at the end of the window when
    /// `anchor` is `None`
    fn insert_after(&mut self, entry: QueueEntry<I>, anchor: Option<EntryKey>);

    /// Remove an entry by identity
    fn remove(&mut self, key: EntryKey);

    /// Drop the active entry and start the next one
    fn advance_to_next(&mut self);

    /// Restart the active entry from the beginning
    fn seek_to_start(&mut self);

    /// Keys of the loaded entries, active first
    fn window(&self) -> Vec<EntryKey>;

    fn window_len(&self) -> usize {
        self.window().len()
    }

    fn active(&self) -> Option<EntryKey> {
        self.window().first().copied()
    }
}

/// Primitive calls received by a [`MemoryEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    InsertAfter {
        key: EntryKey,
        anchor: Option<EntryKey>,
    },
    Remove(EntryKey),
    AdvanceToNext,
    SeekToStart,
}

/// In-memory engine that keeps its window in a deque.
///
/// Every primitive call is journaled, which makes it handy both for driving
/// the queue without a real player and for checking which calls were issued.
pub struct MemoryEngine<I> {
    window: VecDeque<QueueEntry<I>>,
    calls: Vec<EngineCall>,
    notifier: Option<Notifier>,
    /// Number of times the active entry was restarted from zero
    restarts: usize,
}

impl<I> Default for MemoryEngine<I> {
    fn default() -> Self {
        Self {
            window: VecDeque::new(),
            calls: Vec::new(),
            notifier: None,
            restarts: 0,
        }
    }
}

impl<I> MemoryEngine<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post active-item changes to the queue's mailbox
    pub fn with_notifier(notifier: Notifier) -> Self {
        Self {
            notifier: Some(notifier),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<EngineCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }

    pub fn entries(&self) -> impl Iterator<Item = &QueueEntry<I>> {
        self.window.iter()
    }

    pub fn active_entry(&self) -> Option<&QueueEntry<I>> {
        self.window.front()
    }

    /// Simulate the active entry playing to its end.
    ///
    /// Not journaled, since it is the engine acting on its own.
    pub fn finish_current(&mut self) {
        let old = self.front_key();
        if self.window.pop_front().is_some() {
            self.notify_if_changed(old);
        }
    }

    fn front_key(&self) -> Option<EntryKey> {
        self.window.front().map(|entry| entry.key)
    }

    fn notify_if_changed(&self, old: Option<EntryKey>) {
        let new = self.front_key();
        if old != new {
            if let Some(notifier) = &self.notifier {
                notifier.active_item_changed(old, new);
            }
        }
    }
}

impl<I> QueueEngine<I> for MemoryEngine<I> {
    fn insert_after(&mut self, entry: QueueEntry<I>, anchor: Option<EntryKey>) {
        self.calls.push(EngineCall::InsertAfter { key: entry.key, anchor });
        let old = self.front_key();

        let slot = match anchor {
            Some(anchor) => match self.window.iter().position(|e| e.key == anchor) {
                Some(pos) => pos + 1,
                None => {
                    log::warn!("Anchor {} not loaded, appending {}", anchor, entry.key);
                    self.window.len()
                }
            },
            None => self.window.len(),
        };
        self.window.insert(slot, entry);
        self.notify_if_changed(old);
    }

    fn remove(&mut self, key: EntryKey) {
        self.calls.push(EngineCall::Remove(key));
        let old = self.front_key();
        self.window.retain(|entry| entry.key != key);
        self.notify_if_changed(old);
    }

    fn advance_to_next(&mut self) {
        self.calls.push(EngineCall::AdvanceToNext);
        let old = self.front_key();
        self.window.pop_front();
        self.notify_if_changed(old);
    }

    fn seek_to_start(&mut self) {
        self.calls.push(EngineCall::SeekToStart);
        if !self.window.is_empty() {
            self.restarts += 1;
        }
    }

    fn window(&self) -> Vec<EntryKey> {
        self.window.iter().map(|entry| entry.key).collect()
    }

    fn window_len(&self) -> usize {
        self.window.len()
    }

    fn active(&self) -> Option<EntryKey> {
        self.front_key()
    }
}
