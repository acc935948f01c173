use anyhow::{Context, Result};

use slotcast::clock::{Clock, SystemClock};
use slotcast::config::Config;

use super::schedule_store;

pub async fn status(config: &Config) -> Result<()> {
    let store = schedule_store(config);
    let schedule = store
        .load()
        .await
        .context("Failed to read persisted schedule")?;

    let Some(schedule) = schedule else {
        println!(
            "No persisted schedule in {}",
            config.storage.data_dir.display()
        );
        return Ok(());
    };

    let now = SystemClock.now_millis();
    print!("{}", schedule.summary(now).display());
    if schedule.is_expired_at(now) {
        println!("Expired: yes (will be replaced on next run)");
    } else {
        println!("Expired: no");
    }

    Ok(())
}
