use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_STOPPED_RATE: f64 = 0.02;
pub const DEFAULT_MOVING_RATE: f64 = 0.05;

/// Per-second prices for the two meter states. Fixed for the lifetime of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub stopped: f64,
    pub moving: f64,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            stopped: DEFAULT_STOPPED_RATE,
            moving: DEFAULT_MOVING_RATE,
        }
    }
}

impl Rates {
    /// Builds a rate pair, rejecting negative or non-finite prices.
    pub fn new(stopped: f64, moving: f64) -> Option<Self> {
        if is_valid_rate(stopped) && is_valid_rate(moving) {
            Some(Self { stopped, moving })
        } else {
            None
        }
    }

    pub fn try_parse(stopped: &str, moving: &str) -> Option<Self> {
        stopped
            .trim()
            .parse::<f64>()
            .ok()
            .zip(moving.trim().parse::<f64>().ok())
            .and_then(|(stopped, moving)| Rates::new(stopped, moving))
    }

    /// Parses user input. If either value is unusable, logs it and returns
    /// `Err(fallback)` so callers can tell the user which prices apply.
    pub fn parse_checked(stopped: &str, moving: &str, fallback: Rates) -> Result<Self, Self> {
        Self::try_parse(stopped, moving).ok_or_else(|| {
            warn!(
                stopped = stopped,
                moving = moving,
                "invalid rate input, using {}/{}",
                fallback.stopped,
                fallback.moving
            );
            fallback
        })
    }

    /// Parses user input. If either value is unusable both fall back to `fallback`.
    pub fn parse_or(stopped: &str, moving: &str, fallback: Rates) -> Self {
        Self::parse_checked(stopped, moving, fallback).unwrap_or_else(|fallback| fallback)
    }

    pub fn parse(stopped: &str, moving: &str) -> Self {
        Self::parse_or(stopped, moving, Rates::default())
    }
}

fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate >= 0.0
}
