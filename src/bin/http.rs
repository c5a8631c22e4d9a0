#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use roster_scheduler::persistence::SqliteStore;
    use roster_scheduler::{Scheduler, SchedulerConfig, http_api, logging};

    let config = SchedulerConfig::from_env()?;
    logging::init(&config.log_filter);

    let addr: SocketAddr = config.http_addr.parse()?;
    let store = match &config.db_path {
        Some(path) => SqliteStore::new(path)?,
        None => SqliteStore::in_memory()?,
    };

    tracing::info!(%addr, db = ?config.db_path, "roster-scheduler HTTP API listening");
    let scheduler = Scheduler::with_config(Arc::new(store), config);
    http_api::serve(addr, scheduler).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
