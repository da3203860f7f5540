use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateType {
    /// A temporary buyer's tag, which expires.
    BuyerTag,
    Standard,
    Dealer,
}

text_enum!(PlateType {
    BuyerTag => "buyer_tag",
    Standard => "standard",
    Dealer => "dealer",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateStatus {
    Available,
    Assigned,
    Expired,
    Lost,
}

text_enum!(PlateStatus {
    Available => "available",
    Assigned => "assigned",
    Expired => "expired",
    Lost => "lost",
});

/// A physical license plate or temporary tag owned by the dealership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct Plate {
    pub id: Uuid,
    pub plate_number: String,
    pub plate_type: PlateType,
    pub status: PlateStatus,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    Rental,
    Sale,
    /// Mounted on a vehicle held in dealership inventory.
    Inventory,
    Internal,
}

text_enum!(AssignmentType {
    Rental => "rental",
    Sale => "sale",
    Inventory => "inventory",
    Internal => "internal",
});

/// A loan of a plate to a customer, vehicle, or internal use. The assignment
/// is active while `returned_at` is null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct PlateAssignment {
    pub id: Uuid,
    pub plate_id: Uuid,
    pub assignment_type: AssignmentType,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub booking_id: Option<Uuid>,
    pub registration_id: Option<Uuid>,
    /// Required for rentals.
    pub expected_return_date: Option<NaiveDate>,
    pub assigned_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl PlateAssignment {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Whether the assignment can be traced to a booking or registration.
    pub fn has_business_reference(&self) -> bool {
        self.booking_id.is_some() || self.registration_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Reserved,
    Active,
    Returned,
    Cancelled,
}

text_enum!(BookingStatus {
    Reserved => "reserved",
    Active => "active",
    Returned => "returned",
    Cancelled => "cancelled",
});

impl BookingStatus {
    /// A closed booking should no longer hold a plate.
    pub fn is_closed(&self) -> bool {
        matches!(self, BookingStatus::Returned | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct RentalBooking {
    pub id: Uuid,
    pub status: BookingStatus,
    pub vehicle_year: Option<i32>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
}

impl RentalBooking {
    pub fn vehicle_description(&self) -> Option<String> {
        crate::vehicle_description(
            self.vehicle_year,
            self.vehicle_make.as_deref(),
            self.vehicle_model.as_deref(),
        )
    }
}
