pub mod clear;
pub mod fetch;
pub mod run;
pub mod status;

// Re-export command functions for convenience
pub use clear::clear;
pub use fetch::fetch;
pub use run::run;
pub use status::status;

use std::sync::Arc;

use slotcast::config::Config;
use slotcast::storage::{FileStore, ScheduleStore};

/// Store backed by the configured data directory
pub(crate) fn schedule_store(config: &Config) -> ScheduleStore {
    ScheduleStore::new(Arc::new(FileStore::new(&config.storage.data_dir)))
}
