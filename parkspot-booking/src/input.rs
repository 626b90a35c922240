use parkspot_core::LifecycleError;
use serde::Deserialize;
use uuid::Uuid;

const VEHICLE_MIN_LEN: usize = 4;
const VEHICLE_MAX_LEN: usize = 16;
const MAX_TOTAL_SLOTS: i32 = 10_000;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("{field}: {reason}")]
    Field { field: &'static str, reason: String },
}

impl ValidationError {
    fn field(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Field {
            field,
            reason: reason.into(),
        }
    }
}

impl From<ValidationError> for LifecycleError {
    fn from(err: ValidationError) -> Self {
        LifecycleError::InvalidInput(err.to_string())
    }
}

/// Request body for booking a slot
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingInput {
    pub lot_id: Uuid,
    pub vehicle_number: String,
}

/// A booking request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub lot_id: Uuid,
    pub vehicle_number: String,
}

impl CreateBookingInput {
    pub fn validate(&self) -> Result<NewBooking, ValidationError> {
        Ok(NewBooking {
            lot_id: self.lot_id,
            vehicle_number: normalize_vehicle_number(&self.vehicle_number)?,
        })
    }
}

/// Trim, upper-case and check a registration plate.
pub fn normalize_vehicle_number(raw: &str) -> Result<String, ValidationError> {
    let plate = raw.trim().to_uppercase();
    let len = plate.chars().count();

    if !(VEHICLE_MIN_LEN..=VEHICLE_MAX_LEN).contains(&len) {
        return Err(ValidationError::field(
            "vehicle_number",
            format!("must be {}-{} characters", VEHICLE_MIN_LEN, VEHICLE_MAX_LEN),
        ));
    }
    if !plate
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == ' ')
    {
        return Err(ValidationError::field(
            "vehicle_number",
            "only letters, digits, spaces and hyphens are allowed",
        ));
    }
    if !plate.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::field(
            "vehicle_number",
            "must contain a letter or digit",
        ));
    }
    Ok(plate)
}

/// Merchant request body for registering a lot
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLotInput {
    pub name: String,
    pub address: String,
    pub price_per_hour: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub total_slots: i32,
}

impl CreateLotInput {
    /// Checks the fields and returns the trimmed copy.
    pub fn validate(&self) -> Result<CreateLotInput, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::field("name", "must not be empty"));
        }
        let address = self.address.trim();
        if address.is_empty() {
            return Err(ValidationError::field("address", "must not be empty"));
        }
        if self.price_per_hour < 0 {
            return Err(ValidationError::field("price_per_hour", "must not be negative"));
        }
        if !(1..=MAX_TOTAL_SLOTS).contains(&self.total_slots) {
            return Err(ValidationError::field(
                "total_slots",
                format!("must be between 1 and {}", MAX_TOTAL_SLOTS),
            ));
        }
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::field("latitude", "must be within [-90, 90]"));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::field("longitude", "must be within [-180, 180]"));
        }

        Ok(CreateLotInput {
            name: name.to_string(),
            address: address.to_string(),
            ..self.clone()
        })
    }
}
