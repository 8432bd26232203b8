use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::{
    item::{ItemError, ItemStatus, PlayableItem},
    watcher::StatusWatch,
};

struct TrackState {
    status: ItemStatus,
    watches: Vec<StatusWatch>,
}

/// Test item whose readiness is resolved by hand
#[derive(Clone)]
pub struct Track {
    name: &'static str,
    state: Arc<Mutex<TrackState>>,
}

impl Track {
    fn with_status(name: &'static str, status: ItemStatus) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(TrackState {
                status,
                watches: Vec::new(),
            })),
        }
    }

    pub fn ready(name: &'static str) -> Self {
        Self::with_status(name, ItemStatus::Ready)
    }

    pub fn pending(name: &'static str) -> Self {
        Self::with_status(name, ItemStatus::Unknown)
    }

    pub fn failed(name: &'static str, error: ItemError) -> Self {
        Self::with_status(name, ItemStatus::Failed(error))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().unwrap().watches.len()
    }

    /// Mark ready and fire every held watch, returns whether any was held
    pub fn resolve_ready(&self) -> bool {
        self.resolve(Ok(()))
    }

    pub fn resolve_failed(&self, error: ItemError) -> bool {
        self.resolve(Err(error))
    }

    fn resolve(&self, outcome: Result<(), ItemError>) -> bool {
        let watches = {
            let mut state = self.state.lock().unwrap();
            state.status = match &outcome {
                Ok(()) => ItemStatus::Ready,
                Err(error) => ItemStatus::Failed(error.clone()),
            };
            std::mem::take(&mut state.watches)
        };
        let fired = !watches.is_empty();
        for watch in watches {
            watch.resolve(outcome.clone());
        }
        fired
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PlayableItem for Track {
    fn status(&self) -> ItemStatus {
        self.state.lock().unwrap().status.clone()
    }

    fn subscribe(&self, watch: StatusWatch) {
        self.state.lock().unwrap().watches.push(watch);
    }
}
