use std::{fmt, str::FromStr};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::rates::Rates;

pub const STARTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TripState {
    #[default]
    #[serde(rename = "stopped")]
    Stopped,
    #[serde(rename = "moving")]
    Moving,
}

impl TripState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripState::Stopped => "stopped",
            TripState::Moving => "moving",
        }
    }
}

impl fmt::Display for TripState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TripState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stopped" | "stop" => Ok(TripState::Stopped),
            "moving" | "move" => Ok(TripState::Moving),
            other => Err(format!("unknown trip state '{other}'")),
        }
    }
}

/// A finished trip as stored. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TripRecord {
    pub id: i64,
    pub started_at: String,
    pub stopped_seconds: f64,
    pub moving_seconds: f64,
    pub total_fare: f64,
}

/// A finished trip before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrip {
    pub started_at: String,
    pub stopped_seconds: f64,
    pub moving_seconds: f64,
    pub total_fare: f64,
}

impl NewTrip {
    pub fn into_record(self, id: i64) -> TripRecord {
        TripRecord {
            id,
            started_at: self.started_at,
            stopped_seconds: self.stopped_seconds,
            moving_seconds: self.moving_seconds,
            total_fare: self.total_fare,
        }
    }
}

/// Live view of the active trip, as if it were finished right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSnapshot {
    pub state: TripState,
    pub started_at: DateTime<Utc>,
    pub rates: Rates,
    pub stopped_seconds: f64,
    pub moving_seconds: f64,
    pub fare: f64,
}

pub fn format_started_at(started_at: DateTime<Utc>) -> String {
    started_at
        .with_timezone(&Local)
        .format(STARTED_AT_FORMAT)
        .to_string()
}
