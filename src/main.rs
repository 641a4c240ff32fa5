use anyhow::Result;
use dotenvy::dotenv;
use tokio::sync::broadcast::error::RecvError;

use joycycles_tracker::config::Config;
use joycycles_tracker::state::{AppState, Clock};
use joycycles_tracker::store::PgEntryStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let store = PgEntryStore::connect(&config.database_url, config.db_max_connections).await?;
    store.ensure_schema().await?;

    let state = AppState::new(store, Clock::System, config.ovulation_day);

    let mut events = state.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!("🔄 Entries changed for {}: {:?}", event.user_id, event.outcome),
                Err(RecvError::Lagged(missed)) => tracing::warn!("⚠️ Missed {} change events", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = joycycles_tracker::app(state);

    tracing::info!("🧠 Server running at {}", config.bind_addr);

    axum::serve(
        tokio::net::TcpListener::bind(config.bind_addr).await?,
        app.into_make_service(),
    )
    .await?;

    Ok(())
}
