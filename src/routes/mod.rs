use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

pub mod dashboard;
pub mod entries;
pub mod history;

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

fn storage_error(e: anyhow::Error) -> (StatusCode, String) {
    tracing::error!("❌ Storage error: {:#}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".into())
}
