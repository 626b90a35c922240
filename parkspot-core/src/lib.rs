pub mod clock;
pub mod retry;
pub mod store;

use parkspot_shared::BookingStatus;
use uuid::Uuid;

pub use clock::{Clock, SystemClock};
pub use retry::{LifecycleSettings, RetryPolicy};
pub use store::{Entity, ParkingStore, StoreError, StoreResult, StoreTransaction};

/// Failures of the booking lifecycle operations.
///
/// Every variant maps to a stable code (see [`LifecycleError::code`]) so callers
/// can tell "nothing to do" apart from "not yours" and from "system inconsistency".
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Parking lot not found: {0}")]
    LotNotFound(Uuid),
    #[error("Parking lot {0} has no vacant slots")]
    LotFull(Uuid),
    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),
    #[error("Invalid booking transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("Data integrity fault: {0}")]
    DataIntegrityFault(String),
    #[error("Transient store failure: {0}")]
    TransientStoreFailure(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl LifecycleError {
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::LotNotFound(_) => "LOT_NOT_FOUND",
            LifecycleError::LotFull(_) => "LOT_FULL",
            LifecycleError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            LifecycleError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LifecycleError::DataIntegrityFault(_) => "DATA_INTEGRITY_FAULT",
            LifecycleError::TransientStoreFailure(_) => "TRANSIENT_STORE_FAILURE",
            LifecycleError::InvalidInput(_) => "INVALID_INPUT",
            LifecycleError::Storage(_) => "STORAGE_FAILURE",
        }
    }

    /// Only lock contention is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LifecycleError::TransientStoreFailure(_))
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity: store::Entity::Lot, id } => LifecycleError::LotNotFound(id),
            StoreError::NotFound { entity: store::Entity::Booking, id } => {
                LifecycleError::BookingNotFound(id)
            }
            StoreError::Contention(msg) => LifecycleError::TransientStoreFailure(msg),
            StoreError::Conflict(msg) | StoreError::Backend(msg) => LifecycleError::Storage(msg),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
