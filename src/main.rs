// Guild-Store: admin shell for the bot database
//
// Loads settings, opens the store and runs the interactive shell.

use anyhow::{Context, Result};
use guild_store::cli::{Repl, Session};
use guild_store::config::Settings;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("guild_store=info")),
        )
        .init();

    let settings = Settings::load().context("failed to load settings")?;
    info!(url = %settings.database.connection_url(), "Starting guild-store");

    let session = Session::postgres(settings.database.clone());

    let tables = settings.chunk_tables();
    if !tables.is_empty() {
        match session.store().chunk(&tables).await {
            Ok(rows) => info!(rows, "Startup chunk complete"),
            Err(e) => warn!(error = %e, "Startup chunk failed"),
        }
    }

    let mut repl = Repl::new(session).context("failed to start shell")?;
    repl.run().await?;
    Ok(())
}
