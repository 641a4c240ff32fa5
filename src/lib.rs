pub mod ads;
pub mod config;
pub mod dates;
pub mod engine;
pub mod history;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod tracker;
pub mod validator;

use axum::{routing::get, Router};

use crate::state::AppState;
use crate::store::EntryStore;

pub fn app<S: EntryStore>(state: AppState<S>) -> Router {
    Router::new()
        .merge(routes::entries::routes(state.clone()))
        .merge(routes::dashboard::routes(state.clone()))
        .merge(routes::history::routes(state))
        .route("/health", get(|| async { "✅ Backend up" }))
}
