use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::{
    engine::QueueEngine,
    item::{EntryKey, QueueEntry},
};

/// What a window operation changed in the engine
#[derive(Debug, Clone)]
pub struct WindowDelta<I> {
    pub inserted: Vec<QueueEntry<I>>,
    pub removed: Vec<EntryKey>,
}

impl<I> Default for WindowDelta<I> {
    fn default() -> Self {
        Self {
            inserted: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<I> WindowDelta<I> {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }

    /// Drop entries that were removed and loaded again within the same
    /// operation; they never left the window as far as the caller is concerned
    fn net(mut self) -> Self {
        let reloaded: Vec<EntryKey> = self
            .inserted
            .iter()
            .map(|entry| entry.key)
            .filter(|key| self.removed.contains(key))
            .collect();
        if !reloaded.is_empty() {
            self.inserted.retain(|entry| !reloaded.contains(&entry.key));
            self.removed.retain(|key| !reloaded.contains(key));
        }
        self
    }
}

/// Translates logical window operations into the engine's primitive calls.
///
/// Holds a weak handle only: the engine belongs to whatever surface renders
/// it. A dropped engine reads the same as no engine attached, and every
/// operation is then a no-op.
pub struct EngineAdapter<I> {
    engine: Option<Weak<RefCell<dyn QueueEngine<I>>>>,
}

impl<I> Default for EngineAdapter<I> {
    fn default() -> Self {
        Self { engine: None }
    }
}

impl<I: Clone + 'static> EngineAdapter<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach<E: QueueEngine<I> + 'static>(&mut self, engine: &Rc<RefCell<E>>) {
        let weak = Rc::downgrade(engine);
        let weak: Weak<RefCell<dyn QueueEngine<I>>> = weak;
        self.engine = Some(weak);
    }

    /// Forget `engine` if it is the attached one, returns true if it was
    pub fn detach<E: QueueEngine<I> + 'static>(&mut self, engine: &Rc<RefCell<E>>) -> bool {
        let matches = self
            .engine
            .as_ref()
            .is_some_and(|weak| std::ptr::addr_eq(weak.as_ptr(), Rc::as_ptr(engine)));
        if matches {
            self.engine = None;
        }
        matches
    }

    pub fn is_attached(&self) -> bool {
        self.engine().is_some()
    }

    fn engine(&self) -> Option<Rc<RefCell<dyn QueueEngine<I>>>> {
        self.engine.as_ref().and_then(Weak::upgrade)
    }

    /// Keys loaded in the engine, or `None` when detached
    pub fn window(&self) -> Option<Vec<EntryKey>> {
        self.engine().map(|engine| engine.borrow().window())
    }

    pub fn window_len(&self) -> usize {
        self.engine().map_or(0, |engine| engine.borrow().window_len())
    }

    pub fn active(&self) -> Option<EntryKey> {
        self.engine().and_then(|engine| engine.borrow().active())
    }

    /// Advance past the active entry, returns the new active key
    pub fn advance(&self) -> Option<EntryKey> {
        let engine = self.engine()?;
        let mut engine = engine.borrow_mut();
        log::debug!("engine: advance_to_next");
        engine.advance_to_next();
        engine.active()
    }

    /// Load `entry` behind the last window slot
    pub fn append(&self, entry: &QueueEntry<I>) -> WindowDelta<I> {
        let mut delta = WindowDelta::default();
        if let Some(engine) = self.engine() {
            let mut engine = engine.borrow_mut();
            let anchor = engine.window().last().copied();
            log::debug!("engine: insert {} after {:?}", entry.key, anchor);
            engine.insert_after(entry.clone(), anchor);
            delta.inserted.push(entry.clone());
        }
        delta
    }

    /// Restart the active entry
    pub fn seek_to_self(&self) -> bool {
        let Some(engine) = self.engine() else {
            return false;
        };
        let mut engine = engine.borrow_mut();
        if engine.window_len() == 0 {
            return false;
        }
        log::debug!("engine: seek_to_start");
        engine.seek_to_start();
        true
    }

    /// Remove the given entries from the engine where they are loaded
    pub fn remove_entries(&self, keys: &[EntryKey]) -> WindowDelta<I> {
        let mut delta = WindowDelta::default();
        let Some(engine) = self.engine() else {
            return delta;
        };
        let mut engine = engine.borrow_mut();
        let window = engine.window();
        for key in keys.iter().filter(|key| window.contains(key)) {
            log::debug!("engine: remove {}", key);
            engine.remove(*key);
            delta.removed.push(*key);
        }
        delta
    }

    /// Bring the engine window into agreement with `desired`.
    ///
    /// `desired[0]` becomes (or stays) the active entry. When it is already
    /// loaded, only the entries in front of it are dropped, so playback is not
    /// interrupted; otherwise it is loaded behind the current active entry,
    /// which is then dropped. The tail is walked slot by slot: matching slots
    /// are left alone, stale entries ahead of a wanted one are removed, and
    /// missing entries are inserted right after their predecessor. Anything
    /// past the end of `desired` is removed.
    pub fn sync_window(&self, desired: &[QueueEntry<I>]) -> WindowDelta<I> {
        let mut delta = WindowDelta::default();
        let Some(engine) = self.engine() else {
            return delta;
        };
        let mut engine = engine.borrow_mut();
        let mut window = engine.window();

        let Some(head) = desired.first() else {
            for key in window.drain(..) {
                log::debug!("engine: remove {}", key);
                engine.remove(key);
                delta.removed.push(key);
            }
            return delta;
        };

        let keep_from = match window.iter().position(|key| *key == head.key) {
            Some(pos) => pos,
            None => {
                // behind the old head, so the engine never runs empty
                let anchor = window.first().copied();
                log::debug!("engine: load {} after {:?}", head.key, anchor);
                engine.insert_after(head.clone(), anchor);
                let slot = usize::from(anchor.is_some());
                window.insert(slot, head.key);
                delta.inserted.push(head.clone());
                slot
            }
        };
        for key in window.drain(..keep_from) {
            log::debug!("engine: remove {}", key);
            engine.remove(key);
            delta.removed.push(key);
        }

        for (slot, entry) in desired.iter().enumerate().skip(1) {
            if window.get(slot) == Some(&entry.key) {
                continue;
            }
            if let Some(offset) = window[slot..].iter().position(|key| *key == entry.key) {
                for key in window.drain(slot..slot + offset) {
                    log::debug!("engine: remove stale {}", key);
                    engine.remove(key);
                    delta.removed.push(key);
                }
                continue;
            }
            let anchor = desired[slot - 1].key;
            log::debug!("engine: insert {} after {}", entry.key, anchor);
            engine.insert_after(entry.clone(), Some(anchor));
            window.insert(slot, entry.key);
            delta.inserted.push(entry.clone());
        }

        for key in window.drain(desired.len()..) {
            log::debug!("engine: trim {}", key);
            engine.remove(key);
            delta.removed.push(key);
        }
        delta.net()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, MemoryEngine};

    fn entries(keys: &[u64]) -> Vec<QueueEntry<u64>> {
        keys.iter().map(|k| QueueEntry::new(EntryKey(*k), *k)).collect()
    }

    fn keys(keys: &[u64]) -> Vec<EntryKey> {
        keys.iter().copied().map(EntryKey).collect()
    }

    fn attached(loaded: &[u64]) -> (EngineAdapter<u64>, Rc<RefCell<MemoryEngine<u64>>>) {
        let engine = Rc::new(RefCell::new(MemoryEngine::new()));
        for entry in entries(loaded) {
            engine.borrow_mut().insert_after(entry, None);
        }
        engine.borrow_mut().take_calls();
        let mut adapter = EngineAdapter::new();
        adapter.attach(&engine);
        (adapter, engine)
    }

    #[test]
    fn detached_adapter_does_nothing() {
        let adapter: EngineAdapter<u64> = EngineAdapter::new();
        assert!(!adapter.is_attached());
        assert!(adapter.sync_window(&entries(&[1, 2])).is_empty());
        assert_eq!(adapter.window(), None);
        assert_eq!(adapter.advance(), None);
    }

    #[test]
    fn dropped_engine_reads_as_detached() {
        let (adapter, engine) = attached(&[1]);
        assert!(adapter.is_attached());
        drop(engine);
        assert!(!adapter.is_attached());
    }

    #[test]
    fn detach_only_matches_the_attached_engine() {
        let (mut adapter, engine) = attached(&[1]);
        let other = Rc::new(RefCell::new(MemoryEngine::<u64>::new()));

        assert!(!adapter.detach(&other));
        assert!(adapter.is_attached());
        assert!(adapter.detach(&engine));
        assert!(!adapter.is_attached());
    }

    #[test]
    fn matching_window_issues_no_calls() {
        let (adapter, engine) = attached(&[1, 2, 3]);
        let delta = adapter.sync_window(&entries(&[1, 2, 3]));
        assert!(delta.is_empty());
        assert!(engine.borrow().calls().is_empty());
    }

    #[test]
    fn fills_an_empty_engine_in_order() {
        let (adapter, engine) = attached(&[]);
        adapter.sync_window(&entries(&[4, 5, 6]));
        assert_eq!(engine.borrow().window(), keys(&[4, 5, 6]));
        assert_eq!(
            engine.borrow().calls()[0],
            EngineCall::InsertAfter { key: EntryKey(4), anchor: None }
        );
    }

    #[test]
    fn diverging_slot_gets_an_insert_before_it() {
        let (adapter, engine) = attached(&[1, 2, 3]);
        let delta = adapter.sync_window(&entries(&[1, 9, 2]));

        assert_eq!(engine.borrow().window(), keys(&[1, 9, 2]));
        assert_eq!(delta.inserted.len(), 1);
        assert_eq!(delta.removed, keys(&[3]));
        assert_eq!(
            engine.borrow().calls(),
            &[
                EngineCall::InsertAfter { key: EntryKey(9), anchor: Some(EntryKey(1)) },
                EngineCall::Remove(EntryKey(3)),
            ]
        );
    }

    #[test]
    fn stale_entries_between_wanted_ones_are_removed() {
        let (adapter, engine) = attached(&[1, 2, 3]);
        adapter.sync_window(&entries(&[1, 3]));
        assert_eq!(engine.borrow().window(), keys(&[1, 3]));
        assert_eq!(engine.borrow().calls(), &[EngineCall::Remove(EntryKey(2))]);
    }

    #[test]
    fn loaded_target_becomes_active_by_dropping_its_prefix() {
        let (adapter, engine) = attached(&[1, 2, 3]);
        adapter.sync_window(&entries(&[3]));
        assert_eq!(engine.borrow().window(), keys(&[3]));
        assert!(
            engine
                .borrow()
                .calls()
                .iter()
                .all(|call| matches!(call, EngineCall::Remove(_)))
        );
    }

    #[test]
    fn unloaded_target_is_loaded_behind_the_active_entry() {
        let (adapter, engine) = attached(&[2, 3]);
        let delta = adapter.sync_window(&entries(&[1, 2, 3]));
        assert_eq!(engine.borrow().window(), keys(&[1, 2, 3]));
        // 2 is dropped and loaded again, which nets out
        assert!(delta.removed.is_empty());
        assert_eq!(delta.inserted.len(), 1);
        assert_eq!(delta.inserted[0].key, EntryKey(1));
        assert_eq!(
            &engine.borrow().calls()[..2],
            &[
                EngineCall::InsertAfter { key: EntryKey(1), anchor: Some(EntryKey(2)) },
                EngineCall::Remove(EntryKey(2)),
            ]
        );
    }

    #[test]
    fn replaced_head_keeps_the_tail() {
        let (adapter, engine) = attached(&[1, 2, 3]);
        adapter.sync_window(&entries(&[9, 2, 3]));
        assert_eq!(engine.borrow().window(), keys(&[9, 2, 3]));
        assert_eq!(engine.borrow().calls().len(), 2);
    }

    #[test]
    fn reloaded_entries_are_not_reported_as_inserted() {
        let (adapter, engine) = attached(&[2, 3, 4]);
        let delta = adapter.sync_window(&entries(&[1, 2, 3]));

        assert_eq!(engine.borrow().window(), keys(&[1, 2, 3]));
        let inserted: Vec<EntryKey> = delta.inserted.iter().map(|entry| entry.key).collect();
        assert_eq!(inserted, keys(&[1]));
        assert_eq!(delta.removed, keys(&[4]));
    }

    #[test]
    fn empty_desired_window_clears_the_engine() {
        let (adapter, engine) = attached(&[1, 2]);
        adapter.sync_window(&[]);
        assert_eq!(engine.borrow().window_len(), 0);
    }

    #[test]
    fn append_and_advance() {
        let (adapter, engine) = attached(&[1]);
        adapter.append(&QueueEntry::new(EntryKey(2), 2));
        assert_eq!(adapter.window_len(), 2);
        assert_eq!(adapter.advance(), Some(EntryKey(2)));
        assert_eq!(engine.borrow().window(), keys(&[2]));
    }

    #[test]
    fn remove_entries_skips_unloaded_keys() {
        let (adapter, engine) = attached(&[1, 2]);
        let delta = adapter.remove_entries(&keys(&[2, 7]));
        assert_eq!(delta.removed, keys(&[2]));
        assert_eq!(engine.borrow().calls(), &[EngineCall::Remove(EntryKey(2))]);
    }

    #[test]
    fn seek_needs_an_active_entry() {
        let (adapter, engine) = attached(&[]);
        assert!(!adapter.seek_to_self());
        engine.borrow_mut().insert_after(QueueEntry::new(EntryKey(1), 1), None);
        assert!(adapter.seek_to_self());
        assert_eq!(engine.borrow().restarts(), 1);
    }
}
