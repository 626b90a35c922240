pub mod catalog;
pub mod duration;
pub mod input;
pub mod manager;

pub use catalog::{LotCatalog, LotQuery, NearPoint};
pub use duration::format_duration;
pub use input::{CreateBookingInput, CreateLotInput, NewBooking, ValidationError};
pub use manager::BookingLifecycleManager;
