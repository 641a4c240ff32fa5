use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{storage_error, UserQuery};
use crate::models::{Category, Flow, Rgba, Timeline};
use crate::state::{AppState, ApplyError};
use crate::store::EntryStore;
use crate::tracker::{Command, Outcome, TrackerError};
use crate::validator::SelectionAction;

#[derive(Debug, Deserialize)]
pub struct NewMark {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub action: SelectionAction,
    pub flow: Option<Flow>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDay {
    pub user_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct EntryView {
    pub date: NaiveDate,
    pub day_key: String,
    pub category: Category,
    pub timeline: Option<Timeline>,
    pub flow: Option<Flow>,
    pub color: Rgba,
}

#[derive(Debug, Serialize)]
pub struct MarkResponse {
    pub outcome: Outcome,
}

pub fn routes<S: EntryStore>(state: AppState<S>) -> Router {
    Router::new()
        .route(
            "/entries",
            get(list_entries::<S>)
                .post(mark_day::<S>)
                .delete(delete_day::<S>),
        )
        .with_state(state)
}

async fn list_entries<S: EntryStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<EntryView>>, (StatusCode, String)> {
    let mut entries = state
        .read(query.user_id, |tracker| {
            tracker
                .entries()
                .iter()
                .map(|entry| EntryView {
                    date: entry.date,
                    day_key: entry.day_key(),
                    category: entry.category,
                    timeline: entry.timeline,
                    flow: entry.flow,
                    color: entry.color(),
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(storage_error)?;

    entries.sort_by_key(|view| (view.date, view.category.as_str()));
    Ok(Json(entries))
}

async fn mark_day<S: EntryStore>(
    State(state): State<AppState<S>>,
    Json(body): Json<NewMark>,
) -> Result<(StatusCode, Json<MarkResponse>), (StatusCode, String)> {
    let command = Command::Mark { date: body.date, action: body.action, flow: body.flow };

    match state.apply(body.user_id, command).await {
        Ok(outcome) => {
            tracing::info!("🩸 {:?} on {} for {}", body.action, body.date, body.user_id);
            Ok((StatusCode::CREATED, Json(MarkResponse { outcome })))
        }
        Err(ApplyError::Rejected(e)) => {
            tracing::info!("🔒 Mark refused for {}: {}", body.user_id, e);
            Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(ApplyError::Storage(e)) => Err(storage_error(e)),
    }
}

async fn delete_day<S: EntryStore>(
    State(state): State<AppState<S>>,
    Json(body): Json<DeleteDay>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.apply(body.user_id, Command::Delete { date: body.date }).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(ApplyError::Rejected(TrackerError::NothingToDelete(_))) => {
            Err((StatusCode::NOT_FOUND, "No entry found".into()))
        }
        Err(ApplyError::Rejected(e)) => Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
        Err(ApplyError::Storage(e)) => Err(storage_error(e)),
    }
}
