use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use crate::{
    clock::ManualClock,
    error::StorageError,
    models::trip::{NewTrip, TripRecord},
    services::storage::TripRepository,
};

pub fn fixed_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap())
}

#[derive(Default)]
pub struct MemoryRepository {
    trips: Mutex<Vec<TripRecord>>,
}

impl MemoryRepository {
    pub fn stored_count(&self) -> usize {
        self.trips.lock().unwrap().len()
    }
}

#[async_trait]
impl TripRepository for MemoryRepository {
    async fn save(&self, trip: &NewTrip) -> Result<TripRecord, StorageError> {
        let mut trips = self.trips.lock().unwrap();
        let record = trip.clone().into_record(trips.len() as i64 + 1);
        trips.push(record.clone());
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<TripRecord>, StorageError> {
        let mut trips = self.trips.lock().unwrap().clone();
        trips.reverse();
        Ok(trips)
    }
}

pub struct BrokenRepository;

#[async_trait]
impl TripRepository for BrokenRepository {
    async fn save(&self, _trip: &NewTrip) -> Result<TripRecord, StorageError> {
        Err(StorageError::Database(sqlx::Error::PoolClosed))
    }

    async fn list_all(&self) -> Result<Vec<TripRecord>, StorageError> {
        Err(StorageError::Database(sqlx::Error::PoolClosed))
    }
}

/// `save` signals `entered`, then waits for `release` before storing.
#[derive(Default)]
pub struct GatedRepository {
    pub entered: Notify,
    pub release: Notify,
    pub inner: MemoryRepository,
}

#[async_trait]
impl TripRepository for GatedRepository {
    async fn save(&self, trip: &NewTrip) -> Result<TripRecord, StorageError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.save(trip).await
    }

    async fn list_all(&self) -> Result<Vec<TripRecord>, StorageError> {
        self.inner.list_all().await
    }
}
