use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    PreBooked,
    Parked,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PreBooked => "PRE_BOOKED",
            BookingStatus::Parked => "PARKED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Whether the booking currently holds a slot in its lot.
    pub fn holds_slot(&self) -> bool {
        matches!(self, BookingStatus::PreBooked | BookingStatus::Parked)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::PreBooked, BookingStatus::Parked)
                | (BookingStatus::PreBooked, BookingStatus::Cancelled)
                | (BookingStatus::Parked, BookingStatus::Completed)
                | (BookingStatus::Parked, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown booking status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRE_BOOKED" => Ok(BookingStatus::PreBooked),
            "PARKED" => Ok(BookingStatus::Parked),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A user's reservation of one slot in a lot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lot_id: Uuid,
    pub vehicle_number: String,
    pub status: BookingStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_duration: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(user_id: Uuid, lot_id: Uuid, vehicle_number: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            lot_id,
            vehicle_number,
            status: BookingStatus::PreBooked,
            start_time: now,
            end_time: None,
            total_duration: None,
            updated_at: now,
        }
    }

    /// Apply a status write. Fields left `None` in the update are kept.
    pub fn apply(&mut self, update: &BookingUpdate) {
        self.status = update.status;
        if update.end_time.is_some() {
            self.end_time = update.end_time;
        }
        if update.total_duration.is_some() {
            self.total_duration = update.total_duration.clone();
        }
        self.updated_at = update.updated_at;
    }
}

/// The columns a status transition may write
#[derive(Debug, Clone, PartialEq)]
pub struct BookingUpdate {
    pub status: BookingStatus,
    pub end_time: Option<DateTime<Utc>>,
    pub total_duration: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BookingUpdate {
    pub fn status(status: BookingStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            end_time: None,
            total_duration: None,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use BookingStatus::*;
        assert!(PreBooked.can_transition_to(Parked));
        assert!(PreBooked.can_transition_to(Cancelled));
        assert!(Parked.can_transition_to(Completed));
        assert!(Parked.can_transition_to(Cancelled));

        assert!(!PreBooked.can_transition_to(Completed));
        assert!(!Parked.can_transition_to(PreBooked));
        for terminal in [Completed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [PreBooked, Parked, Completed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&BookingStatus::PreBooked).unwrap();
        assert_eq!(json, "\"PRE_BOOKED\"");
        assert_eq!("CANCELLED".parse::<BookingStatus>().unwrap(), BookingStatus::Cancelled);
        assert!("Cancelled".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_apply_keeps_unset_fields() {
        let now = Utc::now();
        let mut booking = Booking::new(Uuid::new_v4(), Uuid::new_v4(), "DL01AB1234".into(), now);
        booking.apply(&BookingUpdate {
            status: BookingStatus::Parked,
            end_time: None,
            total_duration: None,
            updated_at: now,
        });
        assert_eq!(booking.status, BookingStatus::Parked);
        assert!(booking.end_time.is_none());
        assert!(booking.total_duration.is_none());
    }
}
