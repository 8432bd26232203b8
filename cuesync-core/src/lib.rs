pub mod adapter;
pub mod commands;
pub mod config;
pub mod engine;
pub mod item;
pub mod queue;
pub mod shuffle;
pub mod watcher;

#[cfg(test)]
mod test_support;

/// Install `env_logger`, filtered by `RUST_LOG` and defaulting to `info`
pub fn init_logger() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init()?;
    Ok(())
}
