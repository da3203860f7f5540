use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registration stage transition awaiting delivery to the customer.
///
/// Stages are kept as the raw keys written by the stage-change writer, so
/// that an unrecognized key fails only the item that carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct NotificationQueueItem {
    pub id: Uuid,
    pub registration_id: Option<Uuid>,
    /// Null for the first notification of a registration.
    pub old_stage: Option<String>,
    pub new_stage: String,
    /// Debounce horizon. The item is not delivered before this time.
    pub send_after: DateTime<Utc>,
    pub notify_customer: bool,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationQueueItem {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.sent && self.notify_customer && self.send_after <= now
    }
}
