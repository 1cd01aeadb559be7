use std::{fmt, sync::Arc};

use anyhow::Context;
use chrono::{DateTime, Duration, TimeZone, Utc};
use cucumber::{given, then, when, World as _};
use taximeter::{
    clock::ManualClock,
    db::{init_pool, DbPool},
    error::AppError,
    models::{rates::Rates, trip::TripState},
    services::{
        storage::SqliteTripRepository,
        taximeter::{FinishedTrip, TaximeterService},
    },
};
use tempfile::TempDir;

const TOLERANCE: f64 = 1e-9;

#[derive(Debug, cucumber::World, Default)]
struct MeterWorld {
    state: Option<TestState>,
    last_error: Option<AppError>,
    finished: Option<FinishedTrip>,
    race: Option<(usize, usize)>,
}

impl MeterWorld {
    fn test_state(&self) -> &TestState {
        self.state.as_ref().expect("taximeter must be initialised first")
    }

    fn service(&self) -> &TaximeterService {
        &self.test_state().service
    }

    fn at_second(&self, second: i64) {
        let state = self.test_state();
        state.clock.set(state.epoch + Duration::seconds(second));
    }

    fn finished(&self) -> &FinishedTrip {
        self.finished.as_ref().expect("a trip must have been finished")
    }
}

struct TestState {
    service: TaximeterService,
    clock: ManualClock,
    epoch: DateTime<Utc>,
    pool: DbPool,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let pool = init_pool(&database_url).await?;
        let repository = SqliteTripRepository::new(pool.clone());
        repository.migrate().await?;

        let epoch = Utc
            .with_ymd_and_hms(2024, 5, 1, 9, 30, 0)
            .single()
            .context("valid epoch")?;
        let clock = ManualClock::new(epoch);
        let service = TaximeterService::new(Arc::new(clock.clone()), Arc::new(repository));

        Ok(Self {
            service,
            clock,
            epoch,
            pool,
            _root: root,
        })
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "expected {expected}, got {actual}"
    );
}

#[given("a fresh taximeter")]
async fn given_fresh_taximeter(world: &mut MeterWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.last_error = None;
    world.finished = None;
    world.race = None;
}

#[given("the trip storage is unavailable")]
async fn given_storage_unavailable(world: &mut MeterWorld) {
    world.test_state().pool.close().await;
}

#[given(regex = r"^finished stopped-only trips lasting (\d+), (\d+) and (\d+) seconds$")]
async fn given_finished_trips(world: &mut MeterWorld, a: i64, b: i64, c: i64) {
    let mut second = 0;
    for duration in [a, b, c] {
        world.at_second(second);
        world
            .service()
            .start_trip(Rates::default())
            .await
            .expect("start trip");
        second += duration;
        world.at_second(second);
        let finished = world.service().finish_trip().await.expect("finish trip");
        assert!(finished.record().is_some(), "trip should be stored");
    }
}

#[when(regex = r"^I start a trip with rates ([\d.]+) and ([\d.]+) at second (\d+)$")]
async fn when_start_trip(world: &mut MeterWorld, stopped: f64, moving: f64, second: i64) {
    world.at_second(second);
    let rates = Rates::new(stopped, moving).expect("valid rates");
    world.last_error = world.service().start_trip(rates).await.err();
}

#[when(regex = r"^I switch to (stopped|moving) at second (\d+)$")]
async fn when_switch_state(world: &mut MeterWorld, state: String, second: i64) {
    world.at_second(second);
    let state: TripState = state.parse().expect("known state");
    world.last_error = world.service().set_state(state).await.err();
}

#[when(regex = r"^I finish the trip at second (\d+)$")]
async fn when_finish_trip(world: &mut MeterWorld, second: i64) {
    world.at_second(second);
    match world.service().finish_trip().await {
        Ok(finished) => {
            world.finished = Some(finished);
            world.last_error = None;
        }
        Err(err) => world.last_error = Some(err),
    }
}

#[when(regex = r"^(\d+) callers start a trip at the same time$")]
async fn when_racing_starts(world: &mut MeterWorld, callers: usize) {
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let service = world.service().clone();
            tokio::spawn(async move { service.start_trip(Rates::default()).await })
        })
        .collect();

    let mut started = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.expect("start task") {
            Ok(_) => started += 1,
            Err(AppError::AlreadyActive) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    world.race = Some((started, rejected));
}

#[then(regex = r"^the trip had ([\d.]+) stopped seconds and ([\d.]+) moving seconds$")]
async fn then_trip_buckets(world: &mut MeterWorld, stopped: f64, moving: f64) {
    let finished = world.finished();
    assert_close(finished.session.stopped_seconds, stopped);
    assert_close(finished.session.moving_seconds, moving);
}

#[then(regex = r"^the fare is ([\d.]+)$")]
async fn then_fare(world: &mut MeterWorld, fare: f64) {
    assert_close(world.finished().total_fare(), fare);
}

#[then(regex = r"^at second (\d+) the live fare is ([\d.]+)$")]
async fn then_live_fare(world: &mut MeterWorld, second: i64, fare: f64) {
    world.at_second(second);
    let live = world.service().query_fare().await.expect("active trip");
    assert_close(live, fare);
}

#[then("the trip was saved")]
async fn then_trip_saved(world: &mut MeterWorld) {
    let finished = world.finished();
    let record = finished.record().expect("stored record");
    assert_close(record.total_fare, finished.total_fare());
}

#[then("the trip was not saved")]
async fn then_trip_not_saved(world: &mut MeterWorld) {
    assert!(world.finished().storage_warning().is_some());
}

#[then(regex = r"^the trip history has (\d+) trips$")]
async fn then_history_len(world: &mut MeterWorld, expected: usize) {
    let trips = world.service().list_trips().await.expect("list trips");
    assert_eq!(trips.len(), expected);
}

#[then(regex = r"^the trip history lists fares ([\d.]+), ([\d.]+), ([\d.]+)$")]
async fn then_history_fares(world: &mut MeterWorld, first: f64, second: f64, third: f64) {
    let trips = world.service().list_trips().await.expect("list trips");
    assert_eq!(trips.len(), 3);
    for (trip, expected) in trips.iter().zip([first, second, third]) {
        assert_close(trip.total_fare, expected);
    }
}

#[then("the trip history ids are descending")]
async fn then_history_ids_descending(world: &mut MeterWorld) {
    let trips = world.service().list_trips().await.expect("list trips");
    assert!(trips.windows(2).all(|pair| pair[0].id > pair[1].id));
}

#[then("no trip is active")]
async fn then_no_trip_active(world: &mut MeterWorld) {
    assert_eq!(world.service().query_state().await, None);
}

#[then("a trip is active")]
async fn then_trip_active(world: &mut MeterWorld) {
    assert_eq!(
        world.service().query_state().await,
        Some(TripState::Stopped)
    );
}

#[then("the last request failed because a trip is already active")]
async fn then_failed_already_active(world: &mut MeterWorld) {
    assert!(matches!(world.last_error, Some(AppError::AlreadyActive)));
}

#[then("the last request failed because no trip is active")]
async fn then_failed_no_active_trip(world: &mut MeterWorld) {
    assert!(matches!(world.last_error, Some(AppError::NoActiveTrip)));
}

#[then(regex = r"^the active trip uses rates ([\d.]+) and ([\d.]+)$")]
async fn then_active_rates(world: &mut MeterWorld, stopped: f64, moving: f64) {
    let snapshot = world.service().snapshot().await.expect("active trip");
    assert_close(snapshot.rates.stopped, stopped);
    assert_close(snapshot.rates.moving, moving);
}

#[then(regex = r"^exactly (\d+) start succeeds and (\d+) are rejected as already active$")]
async fn then_race_result(world: &mut MeterWorld, started: usize, rejected: usize) {
    assert_eq!(world.race, Some((started, rejected)));
}

#[tokio::main]
async fn main() {
    MeterWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run_and_exit("tests/features")
        .await;
}
