//! Database migration command.
//!
//! Applies `crates/storefront/migrations/` and creates the session table
//! used by `tower-sessions`.

use tower_sessions_sqlx_store::PostgresStore;

use crate::{CliError, connect};

/// Run schema and session-store migrations.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running schema migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Running session store migrations...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
