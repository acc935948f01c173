use anyhow::{Context, Result};

use slotcast::config::Config;
use slotcast::error::SlotcastErrorTrait;
use slotcast::player::Player;

pub async fn run(config: &Config) -> Result<()> {
    let mut player = Player::from_config(config).context("Failed to build player")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    };

    match player.run_until(shutdown).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(
                error = %e,
                category = e.category().as_str(),
                "Player stopped"
            );
            // Non-zero exit lets the supervisor restart the display
            Err(e).context("No schedule available; restart required")
        }
    }
}
