use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The title and registration stage of a sold vehicle. The six forward stages
/// are ordered; `Rejected` is a side branch from which a registration may be
/// resubmitted back into the forward sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SaleComplete,
    DocumentsCollected,
    SubmittedToDmv,
    DmvProcessing,
    StickerReady,
    StickerDelivered,
    Rejected,
}

text_enum!(Stage {
    SaleComplete => "sale_complete",
    DocumentsCollected => "documents_collected",
    SubmittedToDmv => "submitted_to_dmv",
    DmvProcessing => "dmv_processing",
    StickerReady => "sticker_ready",
    StickerDelivered => "sticker_delivered",
    Rejected => "rejected",
});

/// Customer-facing metadata of a `Stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageInfo {
    pub label: &'static str,
    pub description: &'static str,
    /// Position in the forward sequence, 1 through 6. `Rejected` is 0.
    pub ordinal: u8,
}

/// Number of stages in the forward sequence.
pub const FORWARD_STAGES: u8 = 6;

impl Stage {
    pub fn info(&self) -> StageInfo {
        let (label, description, ordinal) = match self {
            Stage::SaleComplete => (
                "Sale Complete",
                "Your purchase is complete and your registration paperwork has been started.",
                1,
            ),
            Stage::DocumentsCollected => (
                "Documents Collected",
                "We have collected all of the documents needed to title and register your vehicle.",
                2,
            ),
            Stage::SubmittedToDmv => (
                "Submitted to DMV",
                "Your title and registration application has been submitted to the DMV.",
                3,
            ),
            Stage::DmvProcessing => (
                "DMV Processing",
                "The DMV is processing your application. This usually takes a few weeks.",
                4,
            ),
            Stage::StickerReady => (
                "Sticker Ready",
                "Your registration sticker is ready. We'll reach out to arrange delivery or pickup.",
                5,
            ),
            Stage::StickerDelivered => (
                "Sticker Delivered",
                "Your registration sticker has been delivered. You're all set!",
                6,
            ),
            Stage::Rejected => (
                "Action Needed",
                "The DMV returned your application. Our team is working to correct it and resubmit.",
                0,
            ),
        };
        StageInfo {
            label,
            description,
            ordinal,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Stage::Rejected)
    }
}

/// The channels a customer asked to be notified through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPreference {
    Sms,
    Email,
    Both,
    None,
}

text_enum!(NotificationPreference {
    Sms => "sms",
    Email => "email",
    Both => "both",
    None => "none",
});

impl NotificationPreference {
    pub fn wants_sms(&self) -> bool {
        matches!(self, NotificationPreference::Sms | NotificationPreference::Both)
    }

    pub fn wants_email(&self) -> bool {
        matches!(
            self,
            NotificationPreference::Email | NotificationPreference::Both
        )
    }
}

/// A vehicle sale requiring title and registration processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct Registration {
    pub id: Uuid,
    /// Human-readable order id, shown to the customer.
    pub order_id: String,
    /// Capability secret used to build tracking and unsubscribe links.
    pub access_token: String,
    pub vehicle_year: Option<i32>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vin: Option<String>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub notification_preference: NotificationPreference,
    pub stage: Stage,
    pub rejection_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Registration {
    pub fn vehicle_description(&self) -> Option<String> {
        crate::vehicle_description(
            self.vehicle_year,
            self.vehicle_make.as_deref(),
            self.vehicle_model.as_deref(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stage_table_is_exhaustive_and_ordered() {
        let forward: Vec<u8> = Stage::all()
            .iter()
            .filter(|s| !s.is_rejected())
            .map(|s| s.info().ordinal)
            .collect();
        assert_eq!(forward, (1..=FORWARD_STAGES).collect::<Vec<_>>());
        assert_eq!(0, Stage::Rejected.info().ordinal);

        let mut labels: Vec<&str> = Stage::all().iter().map(|s| s.info().label).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), Stage::all().len(), "labels must be unique");

        for stage in Stage::all() {
            assert!(!stage.info().description.is_empty(), "{stage} description");
        }
    }

    #[test]
    fn test_stage_labels() {
        let table: Vec<_> = Stage::all()
            .iter()
            .map(|s| format!("{} {} {}", s.info().ordinal, s.name(), s.info().label))
            .collect();
        insta::assert_debug_snapshot!(table, @r###"
        [
            "1 sale_complete Sale Complete",
            "2 documents_collected Documents Collected",
            "3 submitted_to_dmv Submitted to DMV",
            "4 dmv_processing DMV Processing",
            "5 sticker_ready Sticker Ready",
            "6 sticker_delivered Sticker Delivered",
            "0 rejected Action Needed",
        ]
        "###);
    }

    #[test]
    fn test_preference_channels() {
        use NotificationPreference as P;
        assert!(P::Sms.wants_sms() && !P::Sms.wants_email());
        assert!(!P::Email.wants_sms() && P::Email.wants_email());
        assert!(P::Both.wants_sms() && P::Both.wants_email());
        assert!(!P::None.wants_sms() && !P::None.wants_email());
    }
}
