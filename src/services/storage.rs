use async_trait::async_trait;
use tracing::debug;

use crate::{
    db::DbPool,
    error::StorageError,
    models::trip::{NewTrip, TripRecord},
};

/// Append-only store of finished trips.
#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Stores a finished trip and returns it with its assigned id.
    async fn save(&self, trip: &NewTrip) -> Result<TripRecord, StorageError>;

    /// All stored trips, most recent first.
    async fn list_all(&self) -> Result<Vec<TripRecord>, StorageError>;
}

/// SQLite-backed trip store. The only system of record for trips.
#[derive(Clone)]
pub struct SqliteTripRepository {
    pool: DbPool,
}

impl SqliteTripRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TripRepository for SqliteTripRepository {
    async fn save(&self, trip: &NewTrip) -> Result<TripRecord, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO trips (started_at, stopped_seconds, moving_seconds, total_fare)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(trip.started_at.as_str())
        .bind(trip.stopped_seconds)
        .bind(trip.moving_seconds)
        .bind(trip.total_fare)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, "trip row inserted");
        Ok(trip.clone().into_record(id))
    }

    async fn list_all(&self) -> Result<Vec<TripRecord>, StorageError> {
        let trips = sqlx::query_as::<_, TripRecord>(
            r#"
            SELECT id, started_at, stopped_seconds, moving_seconds, total_fare
            FROM trips
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(trips)
    }
}
