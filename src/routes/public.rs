use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    auth::{self, CurrentUser},
    error::AppError,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(login_form))
        .route("/login", post(login_submit))
        .route("/logout", post(logout))
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    show_error: bool,
    error_message: String,
    username: String,
}

async fn login_form(current: CurrentUser) -> Response {
    if current.0.is_some() {
        return Redirect::to("/meter").into_response();
    }
    AskamaTemplateResponse::into_response(LoginTemplate {
        show_error: false,
        error_message: String::new(),
        username: String::new(),
    })
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match auth::authenticate_user(&state, &form.username, &form.password) {
        Ok(user) => {
            info!(username = %user.username, "user logged in");
            Ok((
                auth::apply_session_cookie(jar, &user),
                Redirect::to("/meter"),
            )
                .into_response())
        }
        Err(AppError::Unauthorized) => {
            warn!(username = %form.username, "failed login attempt");
            Ok(render_login_error(
                form.username,
                "Incorrect username or password.".into(),
            ))
        }
        Err(err) => Err(err),
    }
}

fn render_login_error(username: String, message: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        AskamaTemplateResponse::into_response(LoginTemplate {
            show_error: true,
            error_message: message,
            username,
        }),
    )
        .into_response()
}

async fn logout(jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    (auth::clear_session_cookie(jar), Redirect::to("/"))
}
