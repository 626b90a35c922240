use async_trait::async_trait;
use parkspot_core::{ParkingStore, StoreError, StoreResult, StoreTransaction};
use parkspot_shared::models::{Booking, BookingUpdate, ParkingLot};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

type Row<T> = Arc<Mutex<T>>;

#[derive(Default)]
struct Tables {
    lots: RwLock<HashMap<Uuid, Row<ParkingLot>>>,
    bookings: RwLock<HashMap<Uuid, Row<Booking>>>,
}

async fn acquire<T>(
    row: Row<T>,
    timeout: Duration,
    entity: &str,
    id: Uuid,
) -> StoreResult<OwnedMutexGuard<T>> {
    tokio::time::timeout(timeout, row.lock_owned())
        .await
        .map_err(|_| StoreError::Contention(format!("timed out waiting for {} {} row lock", entity, id)))
}

/// In-process store with one async mutex per row.
///
/// Transactions hold the row guards they take until commit or drop, and stage
/// their writes on copies; commit swaps the copies in while every guard is
/// still held.
pub struct InMemoryParkingStore {
    tables: Arc<Tables>,
    lock_timeout: Duration,
}

impl InMemoryParkingStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(Duration::from_secs(2))
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(Tables::default()),
            lock_timeout,
        }
    }

    /// Take a lot's row lock outside any transaction, as a long-running
    /// writer elsewhere would.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn hold_lot_lock(&self, id: Uuid) -> Option<OwnedMutexGuard<ParkingLot>> {
        let row = self.tables.lots.read().await.get(&id).cloned()?;
        Some(row.lock_owned().await)
    }

    /// Drop a lot row without touching its bookings. Only useful to reproduce
    /// a corrupted store; lots are otherwise never deleted.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn purge_lot(&self, id: Uuid) -> bool {
        self.tables.lots.write().await.remove(&id).is_some()
    }

    async fn read_row<T: Clone>(&self, row: Row<T>, entity: &str, id: Uuid) -> StoreResult<T> {
        let guard = acquire(row, self.lock_timeout, entity, id).await?;
        Ok((*guard).clone())
    }
}

impl Default for InMemoryParkingStore {
    fn default() -> Self {
        Self::new()
    }
}

struct Staged<T> {
    guard: OwnedMutexGuard<T>,
    value: T,
}

pub struct InMemoryTransaction {
    tables: Arc<Tables>,
    lock_timeout: Duration,
    lots: HashMap<Uuid, Staged<ParkingLot>>,
    bookings: HashMap<Uuid, Staged<Booking>>,
    inserted: Vec<Booking>,
}

impl InMemoryTransaction {
    async fn staged_lot(&mut self, id: Uuid) -> StoreResult<Option<&mut Staged<ParkingLot>>> {
        if !self.lots.contains_key(&id) {
            let row = self.tables.lots.read().await.get(&id).cloned();
            let Some(row) = row else {
                return Ok(None);
            };
            let guard = acquire(row, self.lock_timeout, "lot", id).await?;
            let value = (*guard).clone();
            self.lots.insert(id, Staged { guard, value });
        }
        Ok(self.lots.get_mut(&id))
    }

    async fn staged_booking(&mut self, id: Uuid) -> StoreResult<Option<&mut Staged<Booking>>> {
        if !self.bookings.contains_key(&id) {
            let row = self.tables.bookings.read().await.get(&id).cloned();
            let Some(row) = row else {
                return Ok(None);
            };
            let guard = acquire(row, self.lock_timeout, "booking", id).await?;
            let value = (*guard).clone();
            self.bookings.insert(id, Staged { guard, value });
        }
        Ok(self.bookings.get_mut(&id))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_lot(&mut self, id: Uuid) -> StoreResult<Option<ParkingLot>> {
        Ok(self.staged_lot(id).await?.map(|staged| staged.value.clone()))
    }

    async fn adjust_slots(
        &mut self,
        id: Uuid,
        delta_vacant: i32,
        delta_occupied: i32,
    ) -> StoreResult<ParkingLot> {
        let staged = self
            .staged_lot(id)
            .await?
            .ok_or_else(|| StoreError::lot_not_found(id))?;

        let (vacant, occupied) = staged
            .value
            .adjusted(delta_vacant, delta_occupied)
            .ok_or_else(|| {
                StoreError::Conflict(format!(
                    "slot adjustment ({:+}, {:+}) would make lot {} negative",
                    delta_vacant, delta_occupied, id
                ))
            })?;
        staged.value.vacant_slots = vacant;
        staged.value.occupied_slots = occupied;
        staged.value.version += 1;
        Ok(staged.value.clone())
    }

    async fn lock_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>> {
        if let Some(booking) = self.inserted.iter().find(|b| b.id == id) {
            return Ok(Some(booking.clone()));
        }
        Ok(self.staged_booking(id).await?.map(|staged| staged.value.clone()))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let exists = self.tables.bookings.read().await.contains_key(&booking.id)
            || self.inserted.iter().any(|b| b.id == booking.id);
        if exists {
            return Err(StoreError::Conflict(format!("booking {} already exists", booking.id)));
        }
        self.inserted.push(booking.clone());
        Ok(())
    }

    async fn update_booking_status(&mut self, id: Uuid, update: &BookingUpdate) -> StoreResult<()> {
        if let Some(booking) = self.inserted.iter_mut().find(|b| b.id == id) {
            booking.apply(update);
            return Ok(());
        }
        let staged = self
            .staged_booking(id)
            .await?
            .ok_or_else(|| StoreError::booking_not_found(id))?;
        staged.value.apply(update);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTransaction {
            tables,
            mut lots,
            mut bookings,
            inserted,
            ..
        } = *self;

        for staged in lots.values_mut() {
            std::mem::swap(&mut *staged.guard, &mut staged.value);
        }
        for staged in bookings.values_mut() {
            std::mem::swap(&mut *staged.guard, &mut staged.value);
        }
        if !inserted.is_empty() {
            let mut map = tables.bookings.write().await;
            for booking in inserted {
                map.insert(booking.id, Arc::new(Mutex::new(booking)));
            }
        }

        // Row guards are released together here.
        drop(lots);
        drop(bookings);
        Ok(())
    }
}

#[async_trait]
impl ParkingStore for InMemoryParkingStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            tables: self.tables.clone(),
            lock_timeout: self.lock_timeout,
            lots: HashMap::new(),
            bookings: HashMap::new(),
            inserted: Vec::new(),
        }))
    }

    async fn get_lot(&self, id: Uuid) -> StoreResult<Option<ParkingLot>> {
        let row = self.tables.lots.read().await.get(&id).cloned();
        match row {
            Some(row) => Ok(Some(self.read_row(row, "lot", id).await?)),
            None => Ok(None),
        }
    }

    async fn insert_lot(&self, lot: &ParkingLot) -> StoreResult<()> {
        if !lot.counters_consistent() {
            return Err(StoreError::Conflict(format!(
                "lot {} counters do not add up to its total",
                lot.id
            )));
        }
        let mut lots = self.tables.lots.write().await;
        if lots.contains_key(&lot.id) {
            return Err(StoreError::Conflict(format!("lot {} already exists", lot.id)));
        }
        lots.insert(lot.id, Arc::new(Mutex::new(lot.clone())));
        Ok(())
    }

    async fn list_lots(&self) -> StoreResult<Vec<ParkingLot>> {
        let rows: Vec<(Uuid, Row<ParkingLot>)> = self
            .tables
            .lots
            .read()
            .await
            .iter()
            .map(|(id, row)| (*id, row.clone()))
            .collect();

        let mut lots = Vec::with_capacity(rows.len());
        for (id, row) in rows {
            lots.push(self.read_row(row, "lot", id).await?);
        }
        lots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(lots)
    }

    async fn list_lots_for_merchant(&self, merchant_id: Uuid) -> StoreResult<Vec<ParkingLot>> {
        let mut lots: Vec<ParkingLot> = self
            .list_lots()
            .await?
            .into_iter()
            .filter(|lot| lot.merchant_id == merchant_id)
            .collect();
        lots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(lots)
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = self.tables.bookings.read().await.get(&id).cloned();
        match row {
            Some(row) => Ok(Some(self.read_row(row, "booking", id).await?)),
            None => Ok(None),
        }
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows: Vec<(Uuid, Row<Booking>)> = self
            .tables
            .bookings
            .read()
            .await
            .iter()
            .map(|(id, row)| (*id, row.clone()))
            .collect();

        let mut bookings = Vec::new();
        for (id, row) in rows {
            let booking = self.read_row(row, "booking", id).await?;
            if booking.user_id == user_id {
                bookings.push(booking);
            }
        }
        bookings.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parkspot_shared::models::BookingStatus;

    fn lot(total: i32) -> ParkingLot {
        ParkingLot::new(
            Uuid::new_v4(),
            "Lot".to_string(),
            "Road 1".to_string(),
            1000,
            12.97,
            77.59,
            total,
        )
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = InMemoryParkingStore::new();
        let lot = lot(3);
        store.insert_lot(&lot).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.adjust_slots(lot.id, -1, 1).await.unwrap();
            let booking = Booking::new(Uuid::new_v4(), lot.id, "KA01AB0001".into(), Utc::now());
            tx.insert_booking(&booking).await.unwrap();
            // dropped without commit
        }

        let after = store.get_lot(lot.id).await.unwrap().unwrap();
        assert_eq!((after.vacant_slots, after.occupied_slots), (3, 0));
    }

    #[tokio::test]
    async fn test_commit_applies_all_writes() {
        let store = InMemoryParkingStore::new();
        let lot = lot(3);
        store.insert_lot(&lot).await.unwrap();
        let user = Uuid::new_v4();
        let booking = Booking::new(user, lot.id, "KA01AB0001".into(), Utc::now());

        let mut tx = store.begin().await.unwrap();
        tx.adjust_slots(lot.id, -1, 1).await.unwrap();
        tx.insert_booking(&booking).await.unwrap();
        tx.commit().await.unwrap();

        let after = store.get_lot(lot.id).await.unwrap().unwrap();
        assert_eq!((after.vacant_slots, after.occupied_slots), (2, 1));
        assert_eq!(after.version, lot.version + 1);

        let mut tx = store.begin().await.unwrap();
        tx.update_booking_status(booking.id, &BookingUpdate::status(BookingStatus::Parked, Utc::now()))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stored = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Parked);
        assert_eq!(store.list_bookings_for_user(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_adjust_refuses_negative_counters() {
        let store = InMemoryParkingStore::new();
        let lot = lot(1);
        store.insert_lot(&lot).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let result = tx.adjust_slots(lot.id, 1, -1).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let missing = Uuid::new_v4();
        let result = tx.adjust_slots(missing, -1, 1).await;
        assert!(matches!(result, Err(StoreError::NotFound { id, .. }) if id == missing));
    }

    #[tokio::test]
    async fn test_row_lock_wait_is_bounded() {
        let store = InMemoryParkingStore::with_lock_timeout(Duration::from_millis(20));
        let lot = lot(1);
        store.insert_lot(&lot).await.unwrap();

        let _held = store.hold_lot_lock(lot.id).await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let result = tx.lock_lot(lot.id).await;
        assert!(matches!(result, Err(StoreError::Contention(_))));
    }

    #[tokio::test]
    async fn test_insert_lot_rejects_duplicates_and_bad_counters() {
        let store = InMemoryParkingStore::new();
        let good = lot(2);
        store.insert_lot(&good).await.unwrap();
        assert!(matches!(store.insert_lot(&good).await, Err(StoreError::Conflict(_))));

        let mut bad = lot(2);
        bad.vacant_slots = 5;
        assert!(matches!(store.insert_lot(&bad).await, Err(StoreError::Conflict(_))));
    }
}
