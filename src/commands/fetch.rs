use anyhow::{Context, Result};
use std::sync::Arc;

use slotcast::clock::{Clock, SystemClock};
use slotcast::config::Config;
use slotcast::fetcher::{HttpTransport, ScheduleFetcher};

pub async fn fetch(config: &Config, json: bool) -> Result<()> {
    let transport = HttpTransport::with_timeout(&config.source.base_url, config.request_timeout())
        .context("Failed to create HTTP transport")?;
    let clock = Arc::new(SystemClock);
    let fetcher = ScheduleFetcher::new(
        Arc::new(transport),
        clock.clone(),
        config.source.screen_id.clone(),
    );

    let schedule = fetcher
        .fetch()
        .await
        .with_context(|| format!("Failed to fetch schedule for screen {}", config.source.screen_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
    } else {
        print!("{}", schedule.summary(clock.now_millis()).display());
    }

    Ok(())
}
