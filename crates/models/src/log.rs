use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The channel recorded in the notification log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Email,
    /// An email sent only because the SMS attempt failed.
    EmailFallback,
    /// Nothing was sent. Used to audit skipped deliveries.
    None,
}

text_enum!(Channel {
    Sms => "sms",
    Email => "email",
    EmailFallback => "email_fallback",
    None => "none",
});

/// An audit record of one attempted (or skipped) send. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotificationLog {
    /// Null for plate-alert digests, which go to an admin.
    pub registration_id: Option<Uuid>,
    pub channel: Channel,
    pub old_stage: Option<String>,
    pub new_stage: Option<String>,
    pub subject: Option<String>,
    pub template: String,
    pub provider_message_id: Option<String>,
    pub delivered: bool,
    pub delivery_error: Option<String>,
    pub sent_at: DateTime<Utc>,
}
