use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parkspot_core::{ParkingStore, StoreError, StoreResult, StoreTransaction};
use parkspot_shared::models::{Booking, BookingStatus, BookingUpdate, ParkingLot};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

const LOT_SELECT: &str = "SELECT id, merchant_id, name, address, price_per_hour, latitude, longitude, \
     total_slots, vacant_slots, occupied_slots, version, created_at FROM parking_lots";

const BOOKING_SELECT: &str = "SELECT id, user_id, lot_id, vehicle_number, status, start_time, end_time, \
     total_duration, updated_at FROM bookings";

const LOT_RETURNING: &str = "RETURNING id, merchant_id, name, address, price_per_hour, latitude, longitude, \
     total_slots, vacant_slots, occupied_slots, version, created_at";

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct LotRow {
    id: Uuid,
    merchant_id: Uuid,
    name: String,
    address: String,
    price_per_hour: i32,
    latitude: f64,
    longitude: f64,
    total_slots: i32,
    vacant_slots: i32,
    occupied_slots: i32,
    version: i64,
    created_at: DateTime<Utc>,
}

impl From<LotRow> for ParkingLot {
    fn from(row: LotRow) -> Self {
        ParkingLot {
            id: row.id,
            merchant_id: row.merchant_id,
            name: row.name,
            address: row.address,
            price_per_hour: row.price_per_hour,
            latitude: row.latitude,
            longitude: row.longitude,
            total_slots: row.total_slots,
            vacant_slots: row.vacant_slots,
            occupied_slots: row.occupied_slots,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    lot_id: Uuid,
    vehicle_number: String,
    status: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    total_duration: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<BookingStatus>()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            lot_id: row.lot_id,
            vehicle_number: row.vehicle_number,
            status,
            start_time: row.start_time,
            end_time: row.end_time,
            total_duration: row.total_duration,
            updated_at: row.updated_at,
        })
    }
}

/// Translate driver errors. Lock timeouts, serialization failures, deadlocks
/// and pool exhaustion are contention; constraint violations are conflicts.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut => StoreError::Contention("connection pool timed out".to_string()),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            // lock_not_available, serialization_failure, deadlock_detected
            Some("55P03") | Some("40001") | Some("40P01") => {
                StoreError::Contention(db_err.message().to_string())
            }
            // unique, foreign key, check
            Some("23505") | Some("23503") | Some("23514") => {
                StoreError::Conflict(db_err.message().to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        },
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Postgres-backed store. Transactions take row locks with `FOR UPDATE` and
/// give up after `lock_timeout`.
#[derive(Clone)]
pub struct PgParkingStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgParkingStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_lot(&mut self, id: Uuid) -> StoreResult<Option<ParkingLot>> {
        let sql = format!("{} WHERE id = $1 FOR UPDATE", LOT_SELECT);
        let row = sqlx::query_as::<_, LotRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(ParkingLot::from))
    }

    async fn adjust_slots(
        &mut self,
        id: Uuid,
        delta_vacant: i32,
        delta_occupied: i32,
    ) -> StoreResult<ParkingLot> {
        // Compare-and-adjust: the guard makes the write a no-op instead of
        // letting a counter go negative.
        let sql = format!(
            "UPDATE parking_lots \
             SET vacant_slots = vacant_slots + $2, occupied_slots = occupied_slots + $3, version = version + 1 \
             WHERE id = $1 AND vacant_slots + $2 >= 0 AND occupied_slots + $3 >= 0 {}",
            LOT_RETURNING
        );
        let row = sqlx::query_as::<_, LotRow>(&sql)
            .bind(id)
            .bind(delta_vacant)
            .bind(delta_occupied)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM parking_lots WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        match exists {
            Some(_) => Err(StoreError::Conflict(format!(
                "slot adjustment ({:+}, {:+}) would make lot {} negative",
                delta_vacant, delta_occupied, id
            ))),
            None => Err(StoreError::lot_not_found(id)),
        }
    }

    async fn lock_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>> {
        let sql = format!("{} WHERE id = $1 FOR UPDATE", BOOKING_SELECT);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        row.map(Booking::try_from).transpose()
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, lot_id, vehicle_number, status, start_time, end_time, total_duration, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.lot_id)
        .bind(&booking.vehicle_number)
        .bind(booking.status.as_str())
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(&booking.total_duration)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_booking_status(&mut self, id: Uuid, update: &BookingUpdate) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2,
                end_time = COALESCE($3, end_time),
                total_duration = COALESCE($4, total_duration),
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status.as_str())
        .bind(update.end_time)
        .bind(&update.total_duration)
        .bind(update.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::booking_not_found(id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl ParkingStore for PgParkingStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // SET does not take bind parameters; the value is an integer we format.
        let set_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis().max(1)
        );
        sqlx::query(&set_timeout)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Box::new(PgTransaction { tx }))
    }

    async fn get_lot(&self, id: Uuid) -> StoreResult<Option<ParkingLot>> {
        let sql = format!("{} WHERE id = $1", LOT_SELECT);
        let row = sqlx::query_as::<_, LotRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(ParkingLot::from))
    }

    async fn insert_lot(&self, lot: &ParkingLot) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO parking_lots (id, merchant_id, name, address, price_per_hour, latitude, longitude, total_slots, vacant_slots, occupied_slots, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(lot.id)
        .bind(lot.merchant_id)
        .bind(&lot.name)
        .bind(&lot.address)
        .bind(lot.price_per_hour)
        .bind(lot.latitude)
        .bind(lot.longitude)
        .bind(lot.total_slots)
        .bind(lot.vacant_slots)
        .bind(lot.occupied_slots)
        .bind(lot.version)
        .bind(lot.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_lots(&self) -> StoreResult<Vec<ParkingLot>> {
        let sql = format!("{} ORDER BY name", LOT_SELECT);
        let rows = sqlx::query_as::<_, LotRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(ParkingLot::from).collect())
    }

    async fn list_lots_for_merchant(&self, merchant_id: Uuid) -> StoreResult<Vec<ParkingLot>> {
        let sql = format!("{} WHERE merchant_id = $1 ORDER BY created_at DESC", LOT_SELECT);
        let rows = sqlx::query_as::<_, LotRow>(&sql)
            .bind(merchant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(ParkingLot::from).collect())
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let sql = format!("{} WHERE id = $1", BOOKING_SELECT);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let sql = format!("{} WHERE user_id = $1 ORDER BY start_time DESC", BOOKING_SELECT);
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(Booking::try_from).collect()
    }
}
