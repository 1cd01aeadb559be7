use chrono::{DateTime, Utc};

use crate::{
    fare::fare,
    models::{
        rates::Rates,
        trip::{format_started_at, NewTrip, TripSnapshot, TripState},
    },
};

/// Timing state of one trip. Consumed by [`TripSession::finish`].
#[derive(Debug, Clone, PartialEq)]
pub struct TripSession {
    state: TripState,
    rates: Rates,
    stopped_seconds: f64,
    moving_seconds: f64,
    started_at: DateTime<Utc>,
    state_entered_at: DateTime<Utc>,
}

/// Final buckets and fare of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSession {
    pub started_at: DateTime<Utc>,
    pub final_state: TripState,
    pub stopped_seconds: f64,
    pub moving_seconds: f64,
    pub total_fare: f64,
}

impl FinishedSession {
    pub fn to_new_trip(&self) -> NewTrip {
        NewTrip {
            started_at: format_started_at(self.started_at),
            stopped_seconds: self.stopped_seconds,
            moving_seconds: self.moving_seconds,
            total_fare: self.total_fare,
        }
    }
}

impl TripSession {
    pub fn start(rates: Rates, now: DateTime<Utc>) -> Self {
        Self {
            state: TripState::Stopped,
            rates,
            stopped_seconds: 0.0,
            moving_seconds: 0.0,
            started_at: now,
            state_entered_at: now,
        }
    }

    pub fn state(&self) -> TripState {
        self.state
    }

    pub fn rates(&self) -> Rates {
        self.rates
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn stopped_seconds(&self) -> f64 {
        self.stopped_seconds
    }

    pub fn moving_seconds(&self) -> f64 {
        self.moving_seconds
    }

    /// Flushes the time spent in the current state and enters `new_state`.
    /// Returns the flushed interval in seconds.
    pub fn transition(&mut self, new_state: TripState, now: DateTime<Utc>) -> f64 {
        let elapsed = self.flush(now);
        self.state = new_state;
        elapsed
    }

    pub fn finish(mut self, now: DateTime<Utc>) -> FinishedSession {
        self.flush(now);
        FinishedSession {
            started_at: self.started_at,
            final_state: self.state,
            stopped_seconds: self.stopped_seconds,
            moving_seconds: self.moving_seconds,
            total_fare: fare(self.stopped_seconds, self.moving_seconds, self.rates),
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TripSnapshot {
        let in_flight = self.elapsed_since_entered(now);
        let (stopped_seconds, moving_seconds) = match self.state {
            TripState::Stopped => (self.stopped_seconds + in_flight, self.moving_seconds),
            TripState::Moving => (self.stopped_seconds, self.moving_seconds + in_flight),
        };
        TripSnapshot {
            state: self.state,
            started_at: self.started_at,
            rates: self.rates,
            stopped_seconds,
            moving_seconds,
            fare: fare(stopped_seconds, moving_seconds, self.rates),
        }
    }

    fn flush(&mut self, now: DateTime<Utc>) -> f64 {
        let elapsed = self.elapsed_since_entered(now);
        match self.state {
            TripState::Stopped => self.stopped_seconds += elapsed,
            TripState::Moving => self.moving_seconds += elapsed,
        }
        // Never move backwards, even if the clock did.
        self.state_entered_at = now.max(self.state_entered_at);
        elapsed
    }

    fn elapsed_since_entered(&self, now: DateTime<Utc>) -> f64 {
        let delta = now - self.state_entered_at;
        let seconds = delta
            .num_microseconds()
            .map(|micros| micros as f64 / 1_000_000.0)
            .unwrap_or_else(|| delta.num_milliseconds() as f64 / 1_000.0);
        seconds.max(0.0)
    }
}
