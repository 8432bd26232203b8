use rand::{Rng, seq::SliceRandom};

use crate::item::EntryKey;

/// Randomized navigation order over the playlist's entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShuffleOrder {
    keys: Vec<EntryKey>,
}

impl ShuffleOrder {
    /// Generate a new order using Fisher-Yates
    pub fn shuffled<R: Rng + ?Sized>(keys: impl IntoIterator<Item = EntryKey>, rng: &mut R) -> Self {
        let mut keys: Vec<EntryKey> = keys.into_iter().collect();
        keys.shuffle(rng);
        Self { keys }
    }

    /// Place a new key at a uniformly random slot, leaving the others in order
    pub fn insert_random<R: Rng + ?Sized>(&mut self, key: EntryKey, rng: &mut R) {
        let slot = rng.random_range(0..=self.keys.len());
        self.keys.insert(slot, key);
    }

    /// Remove a key, returns true if it was present
    pub fn remove(&mut self, key: EntryKey) -> bool {
        match self.position(key) {
            Some(pos) => {
                self.keys.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn position(&self, key: EntryKey) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }

    pub fn keys(&self) -> &[EntryKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// True if this order holds exactly the given keys, each once
    pub fn is_permutation_of(&self, keys: &[EntryKey]) -> bool {
        if self.keys.len() != keys.len() {
            return false;
        }
        let mut ours = self.keys.clone();
        let mut theirs = keys.to_vec();
        ours.sort_unstable();
        theirs.sort_unstable();
        ours == theirs
    }
}
