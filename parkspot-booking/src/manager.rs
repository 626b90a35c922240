use crate::duration::format_duration;
use crate::input::{CreateBookingInput, NewBooking};
use parkspot_core::{
    Clock, LifecycleError, LifecycleResult, ParkingStore, RetryPolicy, StoreError, StoreTransaction,
    SystemClock,
};
use parkspot_shared::models::{Booking, BookingStatus, BookingUpdate, ParkingLot};
use parkspot_shared::pii::Masked;
use parkspot_shared::{BookingEvent, BookingEventKind};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Drives bookings through PreBooked → Parked → Completed (or Cancelled),
/// keeping each lot's vacant/occupied counters in lockstep.
///
/// Every mutating operation is one store transaction: the booking row is
/// locked first, then the lot row, and both writes commit together.
pub struct BookingLifecycleManager {
    store: Arc<dyn ParkingStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    events: Option<broadcast::Sender<BookingEvent>>,
}

impl BookingLifecycleManager {
    pub fn new(store: Arc<dyn ParkingStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
            events: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<BookingEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Reserve a slot: PreBooked, `vacant - 1`, `occupied + 1`.
    pub async fn create(&self, user_id: Uuid, input: CreateBookingInput) -> LifecycleResult<Booking> {
        let new_booking = input.validate()?;
        let (booking, lot) = self
            .with_retry("create", || self.try_create(user_id, &new_booking))
            .await?;

        info!(
            booking_id = %booking.id,
            lot_id = %lot.id,
            vehicle = %Masked(booking.vehicle_number.as_str()),
            vacant = lot.vacant_slots,
            "Booking created"
        );
        self.publish(&booking, &lot, BookingEventKind::Created);
        Ok(booking)
    }

    /// PreBooked or Parked → Cancelled, releasing the slot.
    pub async fn cancel(&self, user_id: Uuid, booking_id: Uuid) -> LifecycleResult<Booking> {
        let (booking, lot) = self
            .with_retry("cancel", || {
                self.try_transition(user_id, booking_id, BookingStatus::Cancelled)
            })
            .await?;

        info!(booking_id = %booking.id, lot_id = %booking.lot_id, "Booking cancelled");
        if let Some(lot) = lot {
            self.publish(&booking, &lot, BookingEventKind::Cancelled);
        }
        Ok(booking)
    }

    /// PreBooked → Parked. Lot counters are untouched.
    pub async fn check_in(&self, user_id: Uuid, booking_id: Uuid) -> LifecycleResult<Booking> {
        let (booking, _) = self
            .with_retry("check_in", || {
                self.try_transition(user_id, booking_id, BookingStatus::Parked)
            })
            .await?;

        info!(booking_id = %booking.id, lot_id = %booking.lot_id, "Booking checked in");
        match self.store.get_lot(booking.lot_id).await {
            Ok(Some(lot)) => self.publish(&booking, &lot, BookingEventKind::CheckedIn),
            Ok(None) => warn!(
                booking_id = %booking.id,
                lot_id = %booking.lot_id,
                "Lot missing after check-in, event not published"
            ),
            Err(err) => warn!(
                booking_id = %booking.id,
                lot_id = %booking.lot_id,
                error = %err,
                "Could not read lot after check-in, event not published"
            ),
        }
        Ok(booking)
    }

    /// Parked → Completed, stamping end time and duration and releasing the slot.
    pub async fn check_out(&self, user_id: Uuid, booking_id: Uuid) -> LifecycleResult<Booking> {
        let (booking, lot) = self
            .with_retry("check_out", || {
                self.try_transition(user_id, booking_id, BookingStatus::Completed)
            })
            .await?;

        info!(
            booking_id = %booking.id,
            lot_id = %booking.lot_id,
            duration = booking.total_duration.as_deref().unwrap_or_default(),
            "Booking checked out"
        );
        if let Some(lot) = lot {
            self.publish(&booking, &lot, BookingEventKind::CheckedOut);
        }
        Ok(booking)
    }

    /// A booking as seen by its owner. Other users get `BookingNotFound`.
    pub async fn booking(&self, user_id: Uuid, booking_id: Uuid) -> LifecycleResult<Booking> {
        self.store
            .get_booking(booking_id)
            .await?
            .filter(|booking| booking.user_id == user_id)
            .ok_or(LifecycleError::BookingNotFound(booking_id))
    }

    /// All of a user's bookings, newest first.
    pub async fn history(&self, user_id: Uuid) -> LifecycleResult<Vec<Booking>> {
        Ok(self.store.list_bookings_for_user(user_id).await?)
    }

    async fn try_create(
        &self,
        user_id: Uuid,
        new_booking: &NewBooking,
    ) -> LifecycleResult<(Booking, ParkingLot)> {
        let lot_id = new_booking.lot_id;
        let mut tx = self.store.begin().await?;

        let lot = tx
            .lock_lot(lot_id)
            .await?
            .ok_or(LifecycleError::LotNotFound(lot_id))?;

        if lot.vacant_slots <= 0 {
            debug!(lot_id = %lot_id, "Rejecting booking on full lot");
            return Err(LifecycleError::LotFull(lot_id));
        }

        let lot = tx.adjust_slots(lot_id, -1, 1).await.map_err(|err| match err {
            StoreError::Conflict(_) => LifecycleError::LotFull(lot_id),
            other => other.into(),
        })?;

        let booking = Booking::new(
            user_id,
            lot_id,
            new_booking.vehicle_number.clone(),
            self.clock.now(),
        );
        tx.insert_booking(&booking).await?;
        tx.commit().await?;

        Ok((booking, lot))
    }

    /// Lock the booking, check ownership and the transition, then write the
    /// status and (when the booking stops holding a slot) release the slot in
    /// the same transaction.
    async fn try_transition(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        target: BookingStatus,
    ) -> LifecycleResult<(Booking, Option<ParkingLot>)> {
        let mut tx = self.store.begin().await?;

        let mut booking = tx
            .lock_booking(booking_id)
            .await?
            .filter(|booking| booking.user_id == user_id)
            .ok_or(LifecycleError::BookingNotFound(booking_id))?;

        if !booking.status.can_transition_to(target) {
            return Err(LifecycleError::InvalidTransition {
                from: booking.status,
                to: target,
            });
        }

        let now = self.clock.now();
        let mut update = BookingUpdate::status(target, now);
        if target == BookingStatus::Completed {
            update.end_time = Some(now);
            update.total_duration = Some(format_duration(now - booking.start_time));
        }

        let lot = if booking.status.holds_slot() && !target.holds_slot() {
            Some(release_slot(&mut *tx, &booking).await?)
        } else {
            None
        };

        tx.update_booking_status(booking.id, &update).await?;
        tx.commit().await?;

        booking.apply(&update);
        Ok((booking, lot))
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut attempt_once: F) -> LifecycleResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LifecycleResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_once().await {
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff_after(attempt);
                    warn!(op, attempt, ?delay, error = %err, "Transient store failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn publish(&self, booking: &Booking, lot: &ParkingLot, kind: BookingEventKind) {
        let Some(events) = &self.events else {
            return;
        };
        let event = BookingEvent {
            booking_id: booking.id,
            lot_id: lot.id,
            user_id: booking.user_id,
            kind,
            vacant_slots: lot.vacant_slots,
            occupied_slots: lot.occupied_slots,
            lot_version: lot.version,
            timestamp: self.clock.now().timestamp(),
        };
        // No subscribers is fine.
        let _ = events.send(event);
    }
}

/// Give the booking's slot back to its lot. A missing lot or a refused
/// counter write here means earlier state is already corrupt.
async fn release_slot(
    tx: &mut dyn StoreTransaction,
    booking: &Booking,
) -> LifecycleResult<ParkingLot> {
    match tx.adjust_slots(booking.lot_id, 1, -1).await {
        Ok(lot) => Ok(lot),
        Err(StoreError::NotFound { .. }) => {
            error!(
                booking_id = %booking.id,
                lot_id = %booking.lot_id,
                "Consistency violation: booking references a missing parking lot"
            );
            Err(LifecycleError::DataIntegrityFault(format!(
                "booking {} references missing lot {}",
                booking.id, booking.lot_id
            )))
        }
        Err(StoreError::Conflict(msg)) => {
            error!(
                booking_id = %booking.id,
                lot_id = %booking.lot_id,
                reason = %msg,
                "Consistency violation: slot release refused"
            );
            Err(LifecycleError::DataIntegrityFault(format!(
                "cannot release slot of lot {}: {}",
                booking.lot_id, msg
            )))
        }
        Err(other) => Err(other.into()),
    }
}
