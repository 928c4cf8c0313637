mod handlers;
mod routes;

pub use routes::create_router;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::db::Database;
use crate::dispatch::{event_channel, spawn_dispatcher, spawn_retry_sweep, Dispatcher, EventEmitter};
use crate::ledger::DeliveryLedger;
use crate::registry::SubscriptionRegistry;

/// Shared application state
pub struct AppState {
    pub registry: SubscriptionRegistry,
    pub ledger: DeliveryLedger,
    pub emitter: EventEmitter,
    pub dispatcher: Dispatcher,
}

/// Run the admin API server together with the dispatcher and retry sweep
pub async fn run_server(addr: SocketAddr, db_path: &str, retry_interval_secs: u64) -> Result<()> {
    let db = Database::open(db_path)?;

    let registry = SubscriptionRegistry::new(db.clone());
    let ledger = DeliveryLedger::new(db);
    let dispatcher = Dispatcher::new(registry.clone(), ledger.clone())?;

    let (emitter, rx) = event_channel();
    spawn_dispatcher(dispatcher.clone(), rx);
    spawn_retry_sweep(dispatcher.clone(), retry_interval_secs);

    let state = Arc::new(AppState {
        registry,
        ledger,
        emitter,
        dispatcher,
    });

    let app = create_router(state);

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
