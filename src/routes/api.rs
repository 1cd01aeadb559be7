use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::trip::{TripRecord, TripSnapshot, TripState},
    routes::requested_rates,
    services::taximeter::StateChange,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trip", get(current_trip))
        .route("/trip/start", post(start_trip))
        .route("/trip/state", post(set_state))
        .route("/trip/finish", post(finish_trip))
        .route("/trips", get(list_trips))
}

/// Rates may arrive as JSON numbers or as the raw text a user typed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RateInput {
    Number(f64),
    Text(String),
}

impl RateInput {
    fn into_text(self) -> String {
        match self {
            RateInput::Number(value) => value.to_string(),
            RateInput::Text(text) => text,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    #[serde(default)]
    stopped_rate: Option<RateInput>,
    #[serde(default)]
    moving_rate: Option<RateInput>,
}

#[derive(Debug, Deserialize)]
struct StateRequest {
    state: TripState,
}

#[derive(Debug, Serialize)]
struct StateChangeResponse {
    from: TripState,
    to: TripState,
    elapsed_seconds: f64,
}

impl From<StateChange> for StateChangeResponse {
    fn from(change: StateChange) -> Self {
        Self {
            from: change.from,
            to: change.to,
            elapsed_seconds: change.elapsed_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
struct FinishResponse {
    stopped_seconds: f64,
    moving_seconds: f64,
    total_fare: f64,
    saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<TripRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

async fn current_trip(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<TripSnapshot>, AppError> {
    current.require_user()?;
    state
        .taximeter
        .snapshot()
        .await
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn start_trip(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Option<Json<StartRequest>>,
) -> Result<Json<TripSnapshot>, AppError> {
    current.require_user()?;
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let stopped = request.stopped_rate.map(RateInput::into_text);
    let moving = request.moving_rate.map(RateInput::into_text);
    let rates = requested_rates(
        stopped.as_deref(),
        moving.as_deref(),
        state.taximeter.default_rates(),
    )
    .unwrap_or(state.taximeter.default_rates());

    let snapshot = state.taximeter.start_trip(rates).await?;
    Ok(Json(snapshot))
}

async fn set_state(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<StateRequest>,
) -> Result<Json<StateChangeResponse>, AppError> {
    current.require_user()?;
    let change = state.taximeter.set_state(request.state).await?;
    Ok(Json(change.into()))
}

async fn finish_trip(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<FinishResponse>, AppError> {
    current.require_user()?;
    let finished = state.taximeter.finish_trip().await?;
    let warning = finished.storage_warning().map(ToString::to_string);
    Ok(Json(FinishResponse {
        stopped_seconds: finished.session.stopped_seconds,
        moving_seconds: finished.session.moving_seconds,
        total_fare: finished.total_fare(),
        saved: finished.saved.is_ok(),
        record: finished.saved.ok(),
        warning,
    }))
}

async fn list_trips(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<TripRecord>>, AppError> {
    current.require_user()?;
    Ok(Json(state.taximeter.list_trips().await?))
}
