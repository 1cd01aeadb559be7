pub mod api;
pub mod meter;
pub mod public;

use axum::Router;
use tower_http::services::ServeDir;

use crate::{models::rates::Rates, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .merge(meter::router())
        .nest("/api", api::router())
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}

/// Rates typed into a form. `None` when both fields were left blank.
pub(crate) fn requested_rates(
    stopped: Option<&str>,
    moving: Option<&str>,
    fallback: Rates,
) -> Option<Rates> {
    let stopped = stopped.map(str::trim).filter(|value| !value.is_empty());
    let moving = moving.map(str::trim).filter(|value| !value.is_empty());
    match (stopped, moving) {
        (None, None) => None,
        (stopped, moving) => Some(Rates::parse_or(
            stopped.unwrap_or_default(),
            moving.unwrap_or_default(),
            fallback,
        )),
    }
}
