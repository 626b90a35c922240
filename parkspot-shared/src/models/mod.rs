pub mod booking;
pub mod events;
pub mod lot;

pub use booking::{Booking, BookingStatus, BookingUpdate};
pub use lot::ParkingLot;
