use std::collections::HashMap;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    PrivateCookieJar,
};

use crate::{error::AppError, state::AppState};

pub const SESSION_COOKIE: &str = "taximeter_session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
}

/// The logged-in user, if the session cookie names a configured user.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
        let user = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .filter(|username| state.config.users.contains_key(username))
            .map(|username| AuthenticatedUser { username });
        Ok(Self(user))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }
}

pub fn authenticate_user(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    check_credentials(&state.config.users, username, password)
}

/// Matches a login against the configured `user:password` list.
pub fn check_credentials(
    users: &HashMap<String, String>,
    username: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let username = username.trim();
    match users.get(username) {
        Some(expected) if expected == password.trim() => Ok(AuthenticatedUser {
            username: username.to_string(),
        }),
        _ => Err(AppError::Unauthorized),
    }
}

pub fn apply_session_cookie(jar: PrivateCookieJar, user: &AuthenticatedUser) -> PrivateCookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, user.username.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/").build())
}
