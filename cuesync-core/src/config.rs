use thiserror::Error;

pub const DEFAULT_WINDOW_CAPACITY: usize = 3;

/// The active item plus its successor, so the engine always has something
/// to continue with when the active item ends
pub const MIN_WINDOW_CAPACITY: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window capacity {0} is below the minimum of {min}", min = MIN_WINDOW_CAPACITY)]
    WindowTooSmall(usize),
}

/// Settings for a [`crate::queue::PlaybackQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// How many items of the navigation order are kept loaded in the engine,
    /// the active item included
    pub window_capacity: usize,
    /// Seed for shuffle orders; `None` seeds from the OS
    pub shuffle_seed: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            shuffle_seed: None,
        }
    }
}

impl QueueConfig {
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueueConfigBuilder {
    window_capacity: Option<usize>,
    shuffle_seed: Option<u64>,
}

impl QueueConfigBuilder {
    pub fn window_capacity(mut self, capacity: usize) -> Self {
        self.window_capacity = Some(capacity);
        self
    }

    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<QueueConfig, ConfigError> {
        let window_capacity = self.window_capacity.unwrap_or(DEFAULT_WINDOW_CAPACITY);
        if window_capacity < MIN_WINDOW_CAPACITY {
            return Err(ConfigError::WindowTooSmall(window_capacity));
        }
        Ok(QueueConfig {
            window_capacity,
            shuffle_seed: self.shuffle_seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default() {
        assert_eq!(QueueConfig::builder().build(), Ok(QueueConfig::default()));
    }

    #[test]
    fn windows_without_room_for_a_successor_are_rejected() {
        for capacity in [0, 1] {
            assert_eq!(
                QueueConfig::builder().window_capacity(capacity).build(),
                Err(ConfigError::WindowTooSmall(capacity))
            );
        }
        assert!(QueueConfig::builder().window_capacity(MIN_WINDOW_CAPACITY).build().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let config = QueueConfig::builder().window_capacity(5).shuffle_seed(9).build().unwrap();
        assert_eq!(config.window_capacity, 5);
        assert_eq!(config.shuffle_seed, Some(9));
    }
}
