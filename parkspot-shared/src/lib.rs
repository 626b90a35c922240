pub mod models;
pub mod pii;

pub use models::{Booking, BookingStatus, ParkingLot};
pub use models::events::{BookingEvent, BookingEventKind, LotAvailability};
