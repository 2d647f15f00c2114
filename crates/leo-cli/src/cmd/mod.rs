pub mod config;
pub mod gate;
pub mod queue;
pub mod run;
pub mod sd;

use std::sync::Arc;

use anyhow::Context;
use leo_core::store::{DirectiveStore, PgStore};

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start tokio runtime")
}

/// Connect to the directive database named by `--database-url` / `DATABASE_URL`.
pub(crate) async fn open_store(database_url: Option<&str>) -> anyhow::Result<Arc<dyn DirectiveStore>> {
    let url = database_url
        .filter(|u| !u.trim().is_empty())
        .context("no directive database configured; pass --database-url or set DATABASE_URL")?;
    let store = PgStore::connect(url)
        .await
        .context("failed to connect to the directive database")?;
    Ok(Arc::new(store))
}
