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
use crate::dates::day_key;
use crate::engine::DashboardMetrics;
use crate::state::AppState;
use crate::store::EntryStore;
use crate::validator::{DisabledReason, SelectionAction, Verdict};

#[derive(Debug, Serialize)]
pub struct DashboardView {
    #[serde(flatten)]
    pub metrics: DashboardMetrics,
    pub ovulation_label: Option<String>,
    pub fertile_headline: Option<&'static str>,
    pub fertile_label: Option<String>,
}

#[derive(Deserialize)]
pub struct SelectionQuery {
    pub user_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct ActionView {
    pub enabled: bool,
    pub reason: Option<DisabledReason>,
    pub message: Option<String>,
}

impl From<Verdict> for ActionView {
    fn from(verdict: Verdict) -> Self {
        Self {
            enabled: verdict.enabled,
            reason: verdict.reason,
            message: verdict.reason.map(|reason| reason.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SelectionView {
    pub date: NaiveDate,
    pub day_key: String,
    pub has_open_period: bool,
    pub mark_start: ActionView,
    pub mark_end: ActionView,
    pub mark_other: ActionView,
}

pub fn routes<S: EntryStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard::<S>))
        .route("/selection", get(get_selection::<S>))
        .with_state(state)
}

async fn get_dashboard<S: EntryStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<DashboardView>, (StatusCode, String)> {
    let today = state.today();
    let metrics = state
        .read(query.user_id, |tracker| tracker.metrics(today))
        .await
        .map_err(storage_error)?;

    Ok(Json(DashboardView {
        ovulation_label: metrics.ovulation_label(),
        fertile_headline: metrics.fertile_headline(),
        fertile_label: metrics.fertile_label(),
        metrics,
    }))
}

async fn get_selection<S: EntryStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<SelectionQuery>,
) -> Result<Json<SelectionView>, (StatusCode, String)> {
    let today = state.today();
    let date = query.date;

    let view = state
        .read(query.user_id, |tracker| {
            let selection = tracker.selection(today);
            SelectionView {
                date,
                day_key: day_key(date),
                has_open_period: selection.has_open_period(),
                mark_start: selection.check(date, SelectionAction::MarkStart).into(),
                mark_end: selection.check(date, SelectionAction::MarkEnd).into(),
                mark_other: selection.check(date, SelectionAction::MarkOther).into(),
            }
        })
        .await
        .map_err(storage_error)?;

    Ok(Json(view))
}
