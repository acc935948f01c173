use anyhow::{Context, Result};

use slotcast::config::Config;

use super::schedule_store;

pub async fn clear(config: &Config) -> Result<()> {
    schedule_store(config)
        .clear()
        .await
        .context("Failed to remove persisted schedule")?;

    println!(
        "Removed persisted schedule from {}",
        config.storage.data_dir.display()
    );
    Ok(())
}
