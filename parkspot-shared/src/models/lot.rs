use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parking facility with a fixed number of slots.
///
/// `vacant_slots + occupied_slots == total_slots` must hold for every value
/// that leaves a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParkingLot {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub address: String,
    /// Minor currency units per hour.
    pub price_per_hour: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub total_slots: i32,
    pub vacant_slots: i32,
    pub occupied_slots: i32,
    /// Bumped on every counter change; orders availability updates per lot.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl ParkingLot {
    pub fn new(
        merchant_id: Uuid,
        name: String,
        address: String,
        price_per_hour: i32,
        latitude: f64,
        longitude: f64,
        total_slots: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            name,
            address,
            price_per_hour,
            latitude,
            longitude,
            total_slots,
            vacant_slots: total_slots,
            occupied_slots: 0,
            version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.vacant_slots == 0
    }

    pub fn counters_consistent(&self) -> bool {
        self.vacant_slots >= 0
            && self.occupied_slots >= 0
            && self.vacant_slots + self.occupied_slots == self.total_slots
    }

    /// Counters after applying the deltas, or `None` if either would go negative.
    pub fn adjusted(&self, delta_vacant: i32, delta_occupied: i32) -> Option<(i32, i32)> {
        let vacant = self.vacant_slots.checked_add(delta_vacant)?;
        let occupied = self.occupied_slots.checked_add(delta_occupied)?;
        if vacant < 0 || occupied < 0 {
            return None;
        }
        Some((vacant, occupied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(total: i32) -> ParkingLot {
        ParkingLot::new(
            Uuid::new_v4(),
            "Central".to_string(),
            "1 Main St".to_string(),
            4000,
            28.61,
            77.21,
            total,
        )
    }

    #[test]
    fn test_new_lot_is_fully_vacant() {
        let lot = lot(10);
        assert_eq!(lot.vacant_slots, 10);
        assert_eq!(lot.occupied_slots, 0);
        assert!(!lot.is_full());
        assert!(lot.counters_consistent());
    }

    #[test]
    fn test_adjusted_rejects_negative_counters() {
        let mut lot = lot(1);
        assert_eq!(lot.adjusted(-1, 1), Some((0, 1)));
        lot.vacant_slots = 0;
        lot.occupied_slots = 1;
        assert!(lot.is_full());
        assert_eq!(lot.adjusted(-1, 1), None);
        assert_eq!(lot.adjusted(1, -1), Some((1, 0)));
    }
}
