use async_trait::async_trait;
use parkspot_shared::models::{Booking, BookingUpdate, ParkingLot};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Lot,
    Booking,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Lot => f.write_str("parking lot"),
            Entity::Booking => f.write_str("booking"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: Uuid },
    /// A guarded write was refused (counter would go negative, duplicate key).
    #[error("Conflicting write: {0}")]
    Conflict(String),
    /// A row lock or connection could not be obtained within the bounded wait.
    #[error("Lock contention: {0}")]
    Contention(String),
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn lot_not_found(id: Uuid) -> Self {
        StoreError::NotFound { entity: Entity::Lot, id }
    }

    pub fn booking_not_found(id: Uuid) -> Self {
        StoreError::NotFound { entity: Entity::Booking, id }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One atomic unit of work over lots and bookings.
///
/// Rows read through `lock_*` stay locked until the transaction ends. Nothing
/// written through a transaction is visible to other readers before `commit`,
/// and dropping an uncommitted transaction discards every write.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Lock a lot row for the rest of the transaction.
    async fn lock_lot(&mut self, id: Uuid) -> StoreResult<Option<ParkingLot>>;

    /// Add the deltas to the lot counters. Fails with `Conflict` rather than
    /// letting either counter go negative.
    async fn adjust_slots(
        &mut self,
        id: Uuid,
        delta_vacant: i32,
        delta_occupied: i32,
    ) -> StoreResult<ParkingLot>;

    /// Lock a booking row for the rest of the transaction.
    async fn lock_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn update_booking_status(&mut self, id: Uuid, update: &BookingUpdate) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// Backing store for parking lots and bookings
#[async_trait]
pub trait ParkingStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    async fn get_lot(&self, id: Uuid) -> StoreResult<Option<ParkingLot>>;

    async fn insert_lot(&self, lot: &ParkingLot) -> StoreResult<()>;

    async fn list_lots(&self) -> StoreResult<Vec<ParkingLot>>;

    async fn list_lots_for_merchant(&self, merchant_id: Uuid) -> StoreResult<Vec<ParkingLot>>;

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    /// Newest first by start time.
    async fn list_bookings_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>>;
}
