use std::{fmt, str::FromStr, sync::Arc};

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::{
    clock::Clock,
    error::{AppError, StorageError},
    models::{
        rates::Rates,
        session::{FinishedSession, TripSession},
        trip::{TripRecord, TripSnapshot, TripState},
    },
    services::storage::TripRepository,
};

/// Commands every front end can issue against the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Move,
    Finish,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Move => "move",
            Action::Finish => "finish",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "move" => Ok(Action::Move),
            "finish" => Ok(Action::Finish),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub from: TripState,
    pub to: TripState,
    pub elapsed_seconds: f64,
}

/// Outcome of finishing a trip. The fare is always available; `saved`
/// carries the stored record or the storage failure.
#[derive(Debug)]
pub struct FinishedTrip {
    pub session: FinishedSession,
    pub saved: Result<TripRecord, StorageError>,
}

impl FinishedTrip {
    pub fn total_fare(&self) -> f64 {
        self.session.total_fare
    }

    pub fn record(&self) -> Option<&TripRecord> {
        self.saved.as_ref().ok()
    }

    pub fn storage_warning(&self) -> Option<&StorageError> {
        self.saved.as_ref().err()
    }
}

#[derive(Debug)]
pub enum ActionOutcome {
    Started(TripSnapshot),
    StateChanged(StateChange),
    Finished(FinishedTrip),
}

/// Owns the single active trip and persists it when it finishes.
#[derive(Clone)]
pub struct TaximeterService {
    clock: Arc<dyn Clock>,
    repository: Arc<dyn TripRepository>,
    active: Arc<RwLock<Option<TripSession>>>,
    default_rates: Rates,
}

impl TaximeterService {
    pub fn new(clock: Arc<dyn Clock>, repository: Arc<dyn TripRepository>) -> Self {
        Self {
            clock,
            repository,
            active: Arc::new(RwLock::new(None)),
            default_rates: Rates::default(),
        }
    }

    pub fn with_default_rates(mut self, rates: Rates) -> Self {
        self.default_rates = rates;
        self
    }

    pub fn default_rates(&self) -> Rates {
        self.default_rates
    }

    pub async fn start_trip(&self, rates: Rates) -> Result<TripSnapshot, AppError> {
        let mut active = self.active.write().await;
        if active.is_some() {
            warn!("start requested while a trip is already in progress");
            return Err(AppError::AlreadyActive);
        }

        let now = self.clock.now();
        let session = TripSession::start(rates, now);
        let snapshot = session.snapshot(now);
        *active = Some(session);

        info!(
            stopped_rate = rates.stopped,
            moving_rate = rates.moving,
            "trip started"
        );
        Ok(snapshot)
    }

    pub async fn set_state(&self, state: TripState) -> Result<StateChange, AppError> {
        let mut active = self.active.write().await;
        let Some(session) = active.as_mut() else {
            warn!("cannot change to {state}: no trip in progress");
            return Err(AppError::NoActiveTrip);
        };

        let from = session.state();
        let elapsed_seconds = session.transition(state, self.clock.now());
        info!("state changed from {from} to {state} after {elapsed_seconds:.1}s");

        Ok(StateChange {
            from,
            to: state,
            elapsed_seconds,
        })
    }

    pub async fn finish_trip(&self) -> Result<FinishedTrip, AppError> {
        let session = {
            let mut active = self.active.write().await;
            let Some(session) = active.take() else {
                warn!("finish requested with no trip in progress");
                return Err(AppError::NoActiveTrip);
            };
            session.finish(self.clock.now())
        };

        info!(
            stopped_seconds = session.stopped_seconds,
            moving_seconds = session.moving_seconds,
            "trip finished, fare {:.2}",
            session.total_fare
        );

        // Runs to completion even if the caller is dropped.
        let repository = Arc::clone(&self.repository);
        let trip = session.to_new_trip();
        let store = tokio::spawn(async move {
            let saved = repository.save(&trip).await;
            match &saved {
                Ok(record) => info!(id = record.id, "trip stored"),
                Err(err) => error!("finished trip could not be stored: {err}"),
            }
            saved
        });

        let saved = match store.await {
            Ok(saved) => saved,
            Err(err) => {
                error!("trip store task failed: {err}");
                Err(StorageError::Task(err))
            }
        };

        Ok(FinishedTrip { session, saved })
    }

    pub async fn snapshot(&self) -> Option<TripSnapshot> {
        let active = self.active.read().await;
        active
            .as_ref()
            .map(|session| session.snapshot(self.clock.now()))
    }

    pub async fn query_state(&self) -> Option<TripState> {
        self.active.read().await.as_ref().map(TripSession::state)
    }

    pub async fn query_fare(&self) -> Option<f64> {
        self.snapshot().await.map(|snapshot| snapshot.fare)
    }

    pub async fn list_trips(&self) -> Result<Vec<TripRecord>, AppError> {
        Ok(self.repository.list_all().await?)
    }

    /// Runs a front-end command. `rates` only matters for [`Action::Start`].
    pub async fn apply(
        &self,
        action: Action,
        rates: Option<Rates>,
    ) -> Result<ActionOutcome, AppError> {
        match action {
            Action::Start => {
                let rates = rates.unwrap_or(self.default_rates);
                self.start_trip(rates).await.map(ActionOutcome::Started)
            }
            Action::Stop => self
                .set_state(TripState::Stopped)
                .await
                .map(ActionOutcome::StateChanged),
            Action::Move => self
                .set_state(TripState::Moving)
                .await
                .map(ActionOutcome::StateChanged),
            Action::Finish => self.finish_trip().await.map(ActionOutcome::Finished),
        }
    }
}
