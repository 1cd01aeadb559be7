use std::{collections::HashMap, env, net::SocketAddr};

use crate::{error::AppError, models::rates::Rates};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub cookie_secret: String,
    /// Username to password. Only gates the web front end.
    pub users: HashMap<String, String>,
    /// Rates for trips started without explicit prices.
    pub default_rates: Rates,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://trips.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-taximeter-cookie-secret".to_string());

        let users = parse_users(
            &env::var("TAXIMETER_USERS").unwrap_or_else(|_| "admin:1234".to_string()),
        )?;

        let defaults = Rates::default();
        let stopped = rate_from_env("TAXIMETER_STOPPED_RATE", defaults.stopped)?;
        let moving = rate_from_env("TAXIMETER_MOVING_RATE", defaults.moving)?;
        let default_rates = Rates::new(stopped, moving).ok_or_else(|| {
            AppError::Config("default rates must be finite and non-negative".into())
        })?;

        Ok(Self {
            database_url,
            listen_addr,
            cookie_secret,
            users,
            default_rates,
        })
    }
}

fn rate_from_env(key: &str, default: f64) -> Result<f64, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| AppError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

/// Parses `user:password` pairs separated by commas.
pub fn parse_users(raw: &str) -> Result<HashMap<String, String>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once(':')
                .filter(|(user, _)| !user.trim().is_empty())
                .map(|(user, password)| (user.trim().to_string(), password.to_string()))
                .ok_or_else(|| AppError::Config(format!("invalid TAXIMETER_USERS entry '{entry}'")))
        })
        .collect()
}
