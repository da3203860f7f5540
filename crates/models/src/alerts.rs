use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    OverdueRental,
    ExpiringBuyerTag,
    Unaccounted,
}

text_enum!(AlertType {
    OverdueRental => "overdue_rental",
    ExpiringBuyerTag => "expiring_buyer_tag",
    Unaccounted => "unaccounted",
});

impl AlertType {
    /// Heading used when alerts of this type are grouped in a digest.
    pub fn heading(&self) -> &'static str {
        match self {
            AlertType::OverdueRental => "Overdue Rentals",
            AlertType::ExpiringBuyerTag => "Expiring Buyer's Tags",
            AlertType::Unaccounted => "Unaccounted Plates",
        }
    }
}

/// Severities are ordered, so `Urgent > Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Urgent,
}

text_enum!(Severity {
    Warning => "warning",
    Urgent => "urgent",
});

/// Identity of an alert: at most one alert per key is open at a time.
pub type AlertKey = (Uuid, AlertType);

/// A persisted finding about a plate. Open while `resolved_at` is null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct PlateAlert {
    pub id: Uuid,
    pub plate_id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub first_detected_at: DateTime<Utc>,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PlateAlert {
    pub fn key(&self) -> AlertKey {
        (self.plate_id, self.alert_type)
    }
}

/// A plate condition which holds right now. Detection is stateless, so these
/// are produced from scratch on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedAlert {
    pub plate_id: Uuid,
    pub plate_number: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_overdue: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_until_expiry: Option<i64>,
    /// Why an `unaccounted` plate is considered unaccounted for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DetectedAlert {
    pub fn key(&self) -> AlertKey {
        (self.plate_id, self.alert_type)
    }
}
