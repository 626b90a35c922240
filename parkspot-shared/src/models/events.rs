use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEventKind {
    Created,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

/// Published after a lifecycle transaction commits. Slot counts are the
/// lot's values as of that commit; `lot_version` grows with every counter
/// change, so a consumer can drop updates that arrive out of order.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingEvent {
    pub booking_id: Uuid,
    pub lot_id: Uuid,
    pub user_id: Uuid,
    pub kind: BookingEventKind,
    pub vacant_slots: i32,
    pub occupied_slots: i32,
    pub lot_version: i64,
    pub timestamp: i64,
}

/// The lot-level part of a [`BookingEvent`], without booking or user ids.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LotAvailability {
    pub lot_id: Uuid,
    pub kind: BookingEventKind,
    pub vacant_slots: i32,
    pub occupied_slots: i32,
    pub version: i64,
    pub timestamp: i64,
}

impl From<&BookingEvent> for LotAvailability {
    fn from(event: &BookingEvent) -> Self {
        Self {
            lot_id: event.lot_id,
            kind: event.kind,
            vacant_slots: event.vacant_slots,
            occupied_slots: event.occupied_slots,
            version: event.lot_version,
            timestamp: event.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_drops_owner_fields() {
        let event = BookingEvent {
            booking_id: Uuid::new_v4(),
            lot_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: BookingEventKind::Created,
            vacant_slots: 4,
            occupied_slots: 1,
            lot_version: 7,
            timestamp: 1_700_000_000,
        };

        let json = serde_json::to_value(LotAvailability::from(&event)).unwrap();
        assert_eq!(json["lot_id"], event.lot_id.to_string());
        assert_eq!(json["kind"], "CREATED");
        assert_eq!(json["version"], 7);
        assert!(json.get("user_id").is_none());
        assert!(json.get("booking_id").is_none());
    }
}
