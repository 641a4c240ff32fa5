use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use super::{storage_error, UserQuery};
use crate::history::{period_history, PeriodHistory};
use crate::state::AppState;
use crate::store::EntryStore;

pub fn routes<S: EntryStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/history", get(get_history::<S>))
        .with_state(state)
}

async fn get_history<S: EntryStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<PeriodHistory>, (StatusCode, String)> {
    let history = state
        .read(query.user_id, |tracker| period_history(tracker.entries()))
        .await
        .map_err(storage_error)?;

    Ok(Json(history))
}
