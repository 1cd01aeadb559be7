use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::trip::{format_started_at, TripRecord},
    routes::requested_rates,
    services::taximeter::{Action, ActionOutcome},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/meter", get(meter_page).post(meter_submit))
        .route("/trips", get(trips_list))
}

#[derive(Template)]
#[template(path = "meter.html")]
struct MeterTemplate {
    username: String,
    active: bool,
    state: String,
    started_at: String,
    stopped_seconds: String,
    moving_seconds: String,
    fare: String,
    default_stopped_rate: String,
    default_moving_rate: String,
    show_message: bool,
    is_error: bool,
    message: String,
}

struct Notice {
    is_error: bool,
    message: String,
}

async fn meter_page(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    let Some(user) = current.0 else {
        return Ok(Redirect::to("/").into_response());
    };
    Ok(render_meter(&state, user.username, None).await)
}

#[derive(Deserialize)]
struct MeterForm {
    action: String,
    stopped_rate: Option<String>,
    moving_rate: Option<String>,
}

async fn meter_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<MeterForm>,
) -> Result<Response, AppError> {
    let Some(user) = current.0 else {
        return Ok(Redirect::to("/").into_response());
    };

    let action: Action = form.action.parse().map_err(AppError::BadRequest)?;
    let rates = requested_rates(
        form.stopped_rate.as_deref(),
        form.moving_rate.as_deref(),
        state.taximeter.default_rates(),
    );

    let (status, notice) = match state.taximeter.apply(action, rates).await {
        Ok(outcome) => (StatusCode::OK, describe(outcome)),
        Err(err @ (AppError::AlreadyActive | AppError::NoActiveTrip)) => (
            StatusCode::CONFLICT,
            Notice {
                is_error: true,
                message: format!("Error: {err}."),
            },
        ),
        Err(err) => return Err(err),
    };

    Ok((status, render_meter(&state, user.username, Some(notice)).await).into_response())
}

fn describe(outcome: ActionOutcome) -> Notice {
    match outcome {
        ActionOutcome::Started(snapshot) => Notice {
            is_error: false,
            message: format!(
                "Trip started in '{}' state ({:.2}/s stopped, {:.2}/s moving).",
                snapshot.state, snapshot.rates.stopped, snapshot.rates.moving
            ),
        },
        ActionOutcome::StateChanged(change) => Notice {
            is_error: false,
            message: format!("State changed to '{}'.", change.to),
        },
        ActionOutcome::Finished(trip) => match trip.storage_warning() {
            None => Notice {
                is_error: false,
                message: format!("Trip finished. Total fare: €{:.2}", trip.total_fare()),
            },
            Some(err) => Notice {
                is_error: true,
                message: format!(
                    "Trip finished. Total fare: €{:.2}. Warning: the trip could not be saved ({err}).",
                    trip.total_fare()
                ),
            },
        },
    }
}

async fn render_meter(state: &AppState, username: String, notice: Option<Notice>) -> Response {
    let defaults = state.taximeter.default_rates();
    let snapshot = state.taximeter.snapshot().await;
    let (show_message, is_error, message) = match notice {
        Some(notice) => (true, notice.is_error, notice.message),
        None => (false, false, String::new()),
    };

    let template = match snapshot {
        Some(snapshot) => MeterTemplate {
            username,
            active: true,
            state: snapshot.state.to_string(),
            started_at: format_started_at(snapshot.started_at),
            stopped_seconds: format!("{:.1}", snapshot.stopped_seconds),
            moving_seconds: format!("{:.1}", snapshot.moving_seconds),
            fare: format!("{:.2}", snapshot.fare),
            default_stopped_rate: defaults.stopped.to_string(),
            default_moving_rate: defaults.moving.to_string(),
            show_message,
            is_error,
            message,
        },
        None => MeterTemplate {
            username,
            active: false,
            state: String::new(),
            started_at: String::new(),
            stopped_seconds: String::new(),
            moving_seconds: String::new(),
            fare: String::new(),
            default_stopped_rate: defaults.stopped.to_string(),
            default_moving_rate: defaults.moving.to_string(),
            show_message,
            is_error,
            message,
        },
    };
    AskamaTemplateResponse::into_response(template)
}

#[derive(Clone)]
struct TripRow {
    id: i64,
    started_at: String,
    stopped_seconds: String,
    moving_seconds: String,
    total_fare: String,
}

impl From<TripRecord> for TripRow {
    fn from(record: TripRecord) -> Self {
        Self {
            id: record.id,
            started_at: record.started_at,
            stopped_seconds: format!("{:.1}", record.stopped_seconds),
            moving_seconds: format!("{:.1}", record.moving_seconds),
            total_fare: format!("{:.2}", record.total_fare),
        }
    }
}

#[derive(Template)]
#[template(path = "trips.html")]
struct TripsTemplate {
    trips: Vec<TripRow>,
}

async fn trips_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    if current.0.is_none() {
        return Ok(Redirect::to("/").into_response());
    }
    let trips = state
        .taximeter
        .list_trips()
        .await?
        .into_iter()
        .map(TripRow::from)
        .collect();
    Ok(AskamaTemplateResponse::into_response(TripsTemplate { trips }))
}
