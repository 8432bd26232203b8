use std::{
    fmt,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use cuesync_core::{
    item::{ItemError, ItemStatus, PlayableItem},
    watcher::StatusWatch,
};

/// How long a simulated item takes to open
pub const OPEN_DELAY: Duration = Duration::from_millis(150);

/// Item whose loading is simulated on a background thread.
///
/// Names ending in `!` fail to open.
#[derive(Clone)]
pub struct SimTrack {
    name: Arc<str>,
    status: Arc<Mutex<ItemStatus>>,
}

impl SimTrack {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            status: Arc::new(Mutex::new(ItemStatus::Unknown)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn outcome(&self) -> Result<(), ItemError> {
        if self.name.ends_with('!') {
            Err(ItemError::Open(format!("{} could not be opened", self.name)))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for SimTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for SimTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PlayableItem for SimTrack {
    fn status(&self) -> ItemStatus {
        match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn subscribe(&self, watch: StatusWatch) {
        let track = self.clone();
        thread::spawn(move || {
            thread::sleep(OPEN_DELAY);
            let outcome = track.outcome();
            if let Ok(mut status) = track.status.lock() {
                *status = match &outcome {
                    Ok(()) => ItemStatus::Ready,
                    Err(error) => ItemStatus::Failed(error.clone()),
                };
            }
            log::debug!("{} finished loading", track.name);
            watch.resolve(outcome);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, time::Instant};

    use cuesync_core::{
        commands::PlaylistEvent,
        config::QueueConfig,
        engine::MemoryEngine,
        queue::PlaybackQueue,
    };

    use super::*;

    #[test]
    fn loads_resolve_on_a_background_thread() {
        let (mut queue, handle) = PlaybackQueue::<SimTrack>::new(QueueConfig::default());
        let engine = Rc::new(RefCell::new(MemoryEngine::with_notifier(handle.notifier.clone())));
        queue.attach_engine(&engine);
        queue.extend(vec![SimTrack::new("a"), SimTrack::new("b!")]);

        let mut resolved = Vec::new();
        let deadline = Instant::now() + OPEN_DELAY * 20;
        while resolved.len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
            queue.process_pending();
            resolved.extend(handle.event_rx.try_iter().filter_map(|event| match event {
                PlaylistEvent::ItemOpened(item) => Some((item.name().to_string(), true)),
                PlaylistEvent::ItemFailed { item, .. } => Some((item.name().to_string(), false)),
                PlaylistEvent::CurrentItemChanged { .. } => None,
            }));
        }

        resolved.sort();
        assert_eq!(resolved, vec![("a".to_string(), true), ("b!".to_string(), false)]);
    }

    #[test]
    fn status_tracks_the_load_outcome() {
        let track = SimTrack::new("x!");
        assert_eq!(track.status(), ItemStatus::Unknown);
        assert!(track.outcome().is_err());
        assert!(SimTrack::new("x").outcome().is_ok());
    }
}
