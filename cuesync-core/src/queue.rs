use std::{cell::RefCell, rc::Rc};

use crossbeam_channel::{Receiver, Sender, unbounded};
use rand::{SeedableRng, rngs::StdRng};
use thiserror::Error;

use crate::{
    adapter::{EngineAdapter, WindowDelta},
    commands::{EngineNotification, Notifier, PlaylistChange, PlaylistEvent},
    config::QueueConfig,
    engine::QueueEngine,
    item::{EntryKey, PlayableItem, QueueEntry},
    shuffle::ShuffleOrder,
    watcher::StatusWatcher,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("index {index} is out of range for a playlist of {len} items")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("range {start}..{end} is out of bounds for a playlist of {len} items")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
}

/// The owner's side of a [`PlaybackQueue`]
pub struct QueueHandle<I> {
    /// Events produced by the queue, in order
    pub event_rx: Receiver<PlaylistEvent<I>>,
    /// Mailbox sender for engines and items, usable from any thread
    pub notifier: Notifier,
}

/// Keeps a user-editable playlist in step with a windowed playback engine.
///
/// The playlist is the canonical order. While shuffle is on, navigation
/// follows a shuffle order over the same entries instead. Only the active
/// entry and the few entries after it (up to the configured window capacity)
/// are loaded into the engine, and every mutation or navigation call brings
/// that window back into agreement with the navigation order.
///
/// The queue is single-threaded. Engines and items report back through the
/// [`Notifier`] in the [`QueueHandle`]; those notifications are applied on the
/// owning thread by [`PlaybackQueue::process_pending`].
pub struct PlaybackQueue<I> {
    config: QueueConfig,
    entries: Vec<QueueEntry<I>>,
    shuffle: Option<ShuffleOrder>,
    current: Option<EntryKey>,
    repeat: bool,
    adapter: EngineAdapter<I>,
    watcher: StatusWatcher<I>,
    event_tx: Sender<PlaylistEvent<I>>,
    notify_rx: Receiver<EngineNotification>,
    rng: StdRng,
    next_key: u64,
}

impl<I: PlayableItem + 'static> PlaybackQueue<I> {
    pub fn new(config: QueueConfig) -> (Self, QueueHandle<I>) {
        let (event_tx, event_rx) = unbounded();
        let (notify_tx, notify_rx) = unbounded();
        let notifier = Notifier::new(notify_tx);
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let queue = Self {
            config,
            entries: Vec::new(),
            shuffle: None,
            current: None,
            repeat: false,
            adapter: EngineAdapter::new(),
            watcher: StatusWatcher::new(notifier.clone()),
            event_tx,
            notify_rx,
            rng,
            next_key: 0,
        };
        (queue, QueueHandle { event_rx, notifier })
    }

    // ==============================================
    // Read access
    // ==============================================

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &I> {
        self.entries.iter().map(|entry| &entry.item)
    }

    pub fn entries(&self) -> &[QueueEntry<I>] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&I> {
        self.entries.get(index).map(|entry| &entry.item)
    }

    /// Playlist index of the active item
    pub fn current_index(&self) -> Option<usize> {
        let current = self.current?;
        self.entries.iter().position(|entry| entry.key == current)
    }

    pub fn current_item(&self) -> Option<&I> {
        self.current.and_then(|key| self.entry(key)).map(|entry| &entry.item)
    }

    /// Items in navigation order (shuffled while shuffle is on)
    pub fn effective_order(&self) -> Vec<&I> {
        self.effective_keys()
            .into_iter()
            .filter_map(|key| self.entry(key))
            .map(|entry| &entry.item)
            .collect()
    }

    pub fn shuffle_order(&self) -> Option<&ShuffleOrder> {
        self.shuffle.as_ref()
    }

    pub fn is_engine_attached(&self) -> bool {
        self.adapter.is_attached()
    }

    // ==============================================
    // Modes
    // ==============================================

    pub fn is_repeat_enabled(&self) -> bool {
        self.repeat
    }

    pub fn set_repeat_enabled(&mut self, enabled: bool) {
        if self.repeat != enabled {
            log::info!("Repeat {}", if enabled { "enabled" } else { "disabled" });
        }
        self.repeat = enabled;
    }

    pub fn is_shuffle_enabled(&self) -> bool {
        self.shuffle.is_some()
    }

    /// Switch navigation between a fresh shuffle order and the playlist order.
    ///
    /// The active item keeps playing; only the upcoming part of the engine
    /// window changes.
    pub fn set_shuffle_enabled(&mut self, enabled: bool) {
        if enabled == self.is_shuffle_enabled() {
            return;
        }
        self.shuffle = if enabled {
            Some(ShuffleOrder::shuffled(
                self.entries.iter().map(|entry| entry.key),
                &mut self.rng,
            ))
        } else {
            None
        };
        log::info!("Shuffle {}", if enabled { "enabled" } else { "disabled" });
        self.refresh_window();
    }

    // ==============================================
    // Engine attachment
    // ==============================================

    /// Attach the engine the queue should drive, replacing any previous one.
    ///
    /// Only a weak handle is kept, so dropping the engine elsewhere detaches
    /// it. The window is loaded for the active item right away.
    pub fn attach_engine<E: QueueEngine<I> + 'static>(&mut self, engine: &Rc<RefCell<E>>) {
        if self.adapter.is_attached() {
            log::info!("Replacing the attached engine");
            self.watcher.cancel_all();
        }
        self.adapter.attach(engine);
        log::info!("Engine attached");
        let preloaded = self.adapter.window().unwrap_or_default();
        self.refresh_window();
        self.watch_loaded(&preloaded);
    }

    /// Detach `engine` if it is the attached one. Its contents are left alone.
    pub fn detach_engine<E: QueueEngine<I> + 'static>(&mut self, engine: &Rc<RefCell<E>>) -> bool {
        if !self.adapter.detach(engine) {
            log::warn!("Detach requested for an engine that is not attached");
            return false;
        }
        self.watcher.cancel_all();
        log::info!("Engine detached");
        true
    }

    // ==============================================
    // Playlist mutation
    // ==============================================

    pub fn apply(&mut self, change: PlaylistChange<I>) -> Result<(), QueueError> {
        log::debug!("Applying {} change", change.kind());
        match change {
            PlaylistChange::Insert { index, items } => self.insert(index, items),
            PlaylistChange::Remove { index, count } => self.remove(index, count),
            PlaylistChange::Replace { index, items } => self.replace(index, items),
            PlaylistChange::Reset => {
                self.clear();
                Ok(())
            }
        }
    }

    pub fn push(&mut self, item: I) {
        self.extend(vec![item]);
    }

    pub fn extend(&mut self, items: Vec<I>) {
        let len = self.entries.len();
        self.insert_at(len, items);
    }

    /// Insert items so that the first one lands at `index`
    pub fn insert(&mut self, index: usize, items: Vec<I>) -> Result<(), QueueError> {
        let len = self.entries.len();
        if index > len {
            return Err(QueueError::IndexOutOfRange { index, len });
        }
        self.insert_at(index, items);
        Ok(())
    }

    fn insert_at(&mut self, index: usize, items: Vec<I>) {
        if items.is_empty() {
            return;
        }
        let was_empty = self.entries.is_empty();
        let added: Vec<QueueEntry<I>> = items
            .into_iter()
            .map(|item| QueueEntry::new(self.alloc_key(), item))
            .collect();

        if let Some(order) = self.shuffle.as_mut() {
            for entry in &added {
                order.insert_random(entry.key, &mut self.rng);
            }
        }
        log::debug!("Inserted {} items at {}", added.len(), index);
        self.entries.splice(index..index, added);

        match self.current {
            Some(_) => self.refresh_window(),
            None if was_empty => {
                if let Some(first) = self.effective_keys().first().copied() {
                    self.jump_to(first);
                }
            }
            None => {}
        }
    }

    /// Remove `count` items starting at `index`.
    ///
    /// Removing the active item moves playback to the first surviving item
    /// after it in navigation order, or stops when there is none.
    pub fn remove(&mut self, index: usize, count: usize) -> Result<(), QueueError> {
        let len = self.entries.len();
        let end = index.saturating_add(count);
        if end > len {
            return Err(QueueError::RangeOutOfBounds { start: index, end, len });
        }
        if count == 0 {
            return Ok(());
        }

        let old_order = self.effective_keys();
        let removed: Vec<QueueEntry<I>> = self.entries.drain(index..end).collect();
        let removed_keys: Vec<EntryKey> = removed.iter().map(|entry| entry.key).collect();
        if let Some(order) = self.shuffle.as_mut() {
            for key in &removed_keys {
                order.remove(*key);
            }
        }
        log::debug!("Removed {} items at {}", count, index);

        let delta = self.adapter.remove_entries(&removed_keys);
        self.track(delta);

        let Some(current) = self.current else {
            return Ok(());
        };
        match removed.into_iter().find(|entry| entry.key == current) {
            Some(active) => {
                let next = old_order
                    .iter()
                    .skip_while(|key| **key != current)
                    .find(|key| !removed_keys.contains(key))
                    .copied();
                self.current = next;
                log::info!("Active item {} removed, continuing with {:?}", current, next);
                self.emit(PlaylistEvent::CurrentItemChanged {
                    old: Some(active.item),
                    new: self.item_of(next),
                });
                self.refresh_window();
            }
            None => self.refresh_window(),
        }
        Ok(())
    }

    /// Overwrite the slots starting at `index` with `items`.
    ///
    /// A replaced active item hands over to its replacement.
    pub fn replace(&mut self, index: usize, items: Vec<I>) -> Result<(), QueueError> {
        let len = self.entries.len();
        let end = index.saturating_add(items.len());
        if end > len {
            return Err(QueueError::RangeOutOfBounds { start: index, end, len });
        }

        let mut replaced_active = None;
        for (offset, item) in items.into_iter().enumerate() {
            let key = self.alloc_key();
            let old = std::mem::replace(&mut self.entries[index + offset], QueueEntry::new(key, item));
            if let Some(order) = self.shuffle.as_mut() {
                order.remove(old.key);
                order.insert_random(key, &mut self.rng);
            }
            if self.current == Some(old.key) {
                replaced_active = Some((old.item, key));
            }
        }
        log::debug!("Replaced items {}..{}", index, end);

        if let Some((old_item, key)) = replaced_active {
            self.current = Some(key);
            log::info!("Active item replaced by {}", key);
            self.emit(PlaylistEvent::CurrentItemChanged {
                old: Some(old_item),
                new: self.item_of(Some(key)),
            });
        }
        self.refresh_window();
        Ok(())
    }

    /// Drop every item and stop playback
    pub fn clear(&mut self) {
        let old = self.current_item().cloned();
        self.entries.clear();
        if let Some(order) = self.shuffle.as_mut() {
            order.clear();
        }
        self.current = None;

        let delta = self.adapter.sync_window(&[]);
        self.track(delta);
        self.watcher.cancel_all();
        log::info!("Playlist cleared");

        if old.is_some() {
            self.emit(PlaylistEvent::CurrentItemChanged { old, new: None });
        }
    }

    // ==============================================
    // Navigation
    // ==============================================

    /// Move to the next item in navigation order.
    ///
    /// A single-item playlist restarts its item. At the end of the order this
    /// wraps to the start when repeat is on and does nothing otherwise.
    pub fn move_next(&mut self) {
        let order = self.effective_keys();
        let Some(current) = self.current else {
            if let Some(first) = order.first().copied() {
                self.jump_to(first);
            }
            return;
        };
        if self.entries.len() == 1 {
            self.restart_current();
            return;
        }
        let Some(pos) = order.iter().position(|key| *key == current) else {
            log::warn!("Active entry {} missing from navigation order", current);
            return;
        };

        match order.get(pos + 1) {
            Some(next) => self.advance_to(*next),
            None if self.repeat => {
                log::info!("End of playlist, repeating from the start");
                self.jump_to(order[0]);
            }
            None => log::info!("End of playlist reached"),
        }
    }

    /// Move to the previous item in navigation order, wrapping to the last
    pub fn move_previous(&mut self) {
        let order = self.effective_keys();
        let Some(current) = self.current else {
            if let Some(last) = order.last().copied() {
                self.jump_to(last);
            }
            return;
        };
        if self.entries.len() == 1 {
            self.restart_current();
            return;
        }
        let Some(pos) = order.iter().position(|key| *key == current) else {
            log::warn!("Active entry {} missing from navigation order", current);
            return;
        };

        let target = if pos == 0 { order[order.len() - 1] } else { order[pos - 1] };
        self.jump_to(target);
    }

    /// Make the item at playlist `index` active.
    ///
    /// Moving to the active item restarts it. An index outside the playlist is
    /// rejected without touching any state.
    pub fn move_to(&mut self, index: usize) -> Result<(), QueueError> {
        let Some(target) = self.entries.get(index).map(|entry| entry.key) else {
            return Err(QueueError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        };
        if self.current == Some(target) {
            self.restart_current();
        } else {
            self.jump_to(target);
        }
        Ok(())
    }

    // ==============================================
    // Mailbox
    // ==============================================

    /// Apply every notification posted since the last call, returns how many
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(notification) = self.notify_rx.try_recv() {
            self.handle_notification(notification);
            handled += 1;
        }
        handled
    }

    pub fn handle_notification(&mut self, notification: EngineNotification) {
        match notification {
            EngineNotification::ActiveItemChanged { old, new } => {
                log::debug!("Engine reports active {:?} -> {:?}", old, new);
                self.sync_with_engine();
            }
            EngineNotification::ItemResolved { watch, outcome } => {
                if let Some(event) = self.watcher.resolve(watch, outcome) {
                    self.emit(event);
                }
            }
        }
    }

    /// React to the engine's actual active entry. Echoes of the queue's own
    /// calls find the engine already in agreement and do nothing.
    fn sync_with_engine(&mut self) {
        let Some(window) = self.adapter.window() else {
            log::debug!("No engine attached, ignoring engine notification");
            return;
        };
        match window.first().copied() {
            Some(active) if Some(active) == self.current => {}
            Some(active) if self.entry(active).is_some() => {
                let old = self.current.replace(active);
                log::info!("Engine moved on to {}", active);
                self.emit_change(old, Some(active));
                self.refresh_window();
            }
            Some(active) => {
                log::warn!("Engine reports unknown entry {}, reloading the window", active);
                self.refresh_window();
            }
            None => self.on_window_exhausted(),
        }
    }

    fn on_window_exhausted(&mut self) {
        let Some(current) = self.current else {
            return;
        };
        let order = self.effective_keys();
        let successor = order
            .iter()
            .position(|key| *key == current)
            .and_then(|pos| order.get(pos + 1))
            .copied();
        let target = match successor {
            Some(next) => Some(next),
            None if self.repeat => order.first().copied(),
            None => None,
        };

        match target {
            Some(target) => {
                log::info!("Engine ran out of items, continuing with {}", target);
                self.current = Some(target);
                self.emit_change(Some(current), Some(target));
                self.refresh_window();
            }
            None => {
                log::info!("Playback finished");
                self.current = None;
                self.emit_change(Some(current), None);
            }
        }
    }

    // ==============================================
    // Internals
    // ==============================================

    fn alloc_key(&mut self) -> EntryKey {
        let key = EntryKey(self.next_key);
        self.next_key += 1;
        key
    }

    fn entry(&self, key: EntryKey) -> Option<&QueueEntry<I>> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    fn item_of(&self, key: Option<EntryKey>) -> Option<I> {
        key.and_then(|key| self.entry(key)).map(|entry| entry.item.clone())
    }

    fn effective_keys(&self) -> Vec<EntryKey> {
        match &self.shuffle {
            Some(order) => order.keys().to_vec(),
            None => self.entries.iter().map(|entry| entry.key).collect(),
        }
    }

    /// The entries the engine should hold: the active one and its successors
    fn desired_window(&self) -> Vec<QueueEntry<I>> {
        let Some(current) = self.current else {
            return Vec::new();
        };
        let order = self.effective_keys();
        let Some(pos) = order.iter().position(|key| *key == current) else {
            return Vec::new();
        };
        order[pos..]
            .iter()
            .take(self.config.window_capacity)
            .filter_map(|key| self.entry(*key).cloned())
            .collect()
    }

    fn refresh_window(&mut self) {
        let desired = self.desired_window();
        let delta = self.adapter.sync_window(&desired);
        self.track(delta);
    }

    /// Watch entries that entered the window and drop watches for those that left
    fn track(&mut self, delta: WindowDelta<I>) {
        for entry in &delta.inserted {
            if let Some(event) = self.watcher.watch(entry) {
                self.emit(event);
            }
        }
        match self.adapter.window() {
            Some(window) => self.watcher.retain_window(&window),
            None => self.watcher.cancel_all(),
        }
    }

    /// Watch entries the engine already held that are still loaded
    fn watch_loaded(&mut self, keys: &[EntryKey]) {
        let Some(window) = self.adapter.window() else {
            return;
        };
        for key in keys.iter().filter(|key| window.contains(key)) {
            if let Some(entry) = self.entries.iter().find(|entry| entry.key == *key) {
                self.watcher.resume(entry);
            }
        }
    }

    /// Advance to the entry right after the active one, through the engine's
    /// own advance when it is loaded or can be appended
    fn advance_to(&mut self, target: EntryKey) {
        let window = self.adapter.window().unwrap_or_default();
        match window.len() {
            0 => self.jump_to(target),
            1 => {
                let Some(entry) = self.entry(target).cloned() else {
                    return;
                };
                let delta = self.adapter.append(&entry);
                self.track(delta);
                self.step_engine(target);
            }
            _ if window[1] == target => self.step_engine(target),
            _ => self.jump_to(target),
        }
    }

    fn step_engine(&mut self, target: EntryKey) {
        let active = self.adapter.advance();
        if active != Some(target) {
            log::warn!("Engine advanced to {:?}, expected {}", active, target);
        }
        let old = self.current.replace(target);
        self.emit_change(old, Some(target));
        self.refresh_window();
    }

    fn jump_to(&mut self, target: EntryKey) {
        let old = self.current.replace(target);
        self.emit_change(old, Some(target));
        self.refresh_window();
    }

    fn restart_current(&mut self) {
        let Some(current) = self.current else {
            return;
        };
        if self.adapter.active() == Some(current) {
            self.adapter.seek_to_self();
        } else {
            self.refresh_window();
        }
        log::info!("Restarting {}", current);
        self.emit_change(Some(current), Some(current));
    }

    fn emit_change(&self, old: Option<EntryKey>, new: Option<EntryKey>) {
        log::info!("Current item {:?} -> {:?}", old, new);
        self.emit(PlaylistEvent::CurrentItemChanged {
            old: self.item_of(old),
            new: self.item_of(new),
        });
    }

    fn emit(&self, event: PlaylistEvent<I>) {
        if self.event_tx.send(event).is_err() {
            log::trace!("No event receiver, dropping event");
        }
    }
}
