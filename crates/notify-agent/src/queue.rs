//! Delivery of registration stage changes to customers.
//!
//! Queue items are written by whatever changes a registration's stage, with a
//! `send_after` horizon which debounces rapid successive changes. A run takes
//! each due item in turn, claims it by atomically flipping `sent` from false
//! to true, and only then delivers it. An item is therefore handled by at
//! most one run, even when runs overlap, and it is never delivered twice:
//! the queue is a debounce mechanism, and is not a retry mechanism.
//!
//! Delivery prefers SMS. Email is sent when the customer asked for it, and
//! also as a fallback when an SMS attempt fails. A failed email never falls
//! back to SMS.
use crate::senders::{to_e164, valid_email, EmailSender, SendOutcome, SmsSender};
use crate::App;
use anyhow::Context;
use chrono::{DateTime, Utc};
use models::{Channel, NewNotificationLog, NotificationPreference, NotificationQueueItem, Stage};
use notifications::RegistrationNotice;

/// Counts of what a notification queue run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueueRunSummary {
    /// Queue items claimed and completed by this run.
    pub processed: usize,
    /// Items which completed with an error note, or which could not be claimed.
    pub errors: usize,
}

/// The note recorded on a queue item which was not delivered normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    NoLinkedRegistration,
    SkippedPreferenceNone,
    UnknownStage,
    NoContactInfo,
    AllChannelsFailed,
    ProcessingError(String),
}

impl Note {
    /// Whether the note reports a problem, rather than a deliberate skip.
    pub fn is_error(&self) -> bool {
        !matches!(self, Note::SkippedPreferenceNone)
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Note::NoLinkedRegistration => f.write_str("no_linked_registration"),
            Note::SkippedPreferenceNone => f.write_str("skipped_preference_none"),
            Note::UnknownStage => f.write_str("unknown_stage"),
            Note::NoContactInfo => f.write_str("no_contact_info"),
            Note::AllChannelsFailed => f.write_str("all_channels_failed"),
            Note::ProcessingError(err) => write!(f, "processing_error: {err}"),
        }
    }
}

/// Runs the notification queue once, processing every due item.
///
/// Failures are isolated to the item which caused them: the item is noted,
/// and the run continues with the next one. Only a failure to fetch due
/// items fails the run as a whole.
#[tracing::instrument(skip_all)]
pub async fn run_notification_queue<SMS: SmsSender, EM: EmailSender>(
    app: &App<SMS, EM>,
) -> anyhow::Result<QueueRunSummary> {
    let store = app.store.as_ref();
    let now = store.current_time();

    let items = store
        .fetch_due_notifications(now, app.settings.queue_batch_size)
        .await?;
    let mut summary = QueueRunSummary::default();

    for item in items {
        match store.claim_notification(item.id, now).await {
            Ok(true) => (),
            Ok(false) => {
                tracing::debug!(queue_item = %item.id, "notification was claimed by another run");
                continue;
            }
            Err(error) => {
                // Unclaimed items remain due, and are picked up by a later run.
                tracing::error!(queue_item = %item.id, ?error, "failed to claim notification");
                summary.errors += 1;
                continue;
            }
        }
        summary.processed += 1;

        let note = match process_item(app, &item, now).await {
            Ok(note) => note,
            Err(error) => {
                tracing::error!(queue_item = %item.id, ?error, "failed to process notification");
                Some(Note::ProcessingError(format!("{error:#}")))
            }
        };
        let Some(note) = note else {
            continue;
        };
        if note.is_error() {
            summary.errors += 1;
        }
        if let Err(error) = store.set_notification_error(item.id, &note.to_string()).await {
            tracing::error!(queue_item = %item.id, %note, ?error, "failed to annotate notification");
        }
    }

    tracing::info!(?summary, "finished notification queue run");
    Ok(summary)
}

/// Delivers a single claimed queue item, returning the note to record on it, if any.
#[tracing::instrument(skip_all, fields(
    queue_item = %item.id,
    registration_id = ?item.registration_id,
    new_stage = %item.new_stage,
))]
async fn process_item<SMS: SmsSender, EM: EmailSender>(
    app: &App<SMS, EM>,
    item: &NotificationQueueItem,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<Note>> {
    let store = app.store.as_ref();

    let Some(registration_id) = item.registration_id else {
        return Ok(Some(Note::NoLinkedRegistration));
    };
    let Some(registration) = store.fetch_registration(registration_id).await? else {
        tracing::warn!("notification references a missing registration");
        return Ok(Some(Note::NoLinkedRegistration));
    };

    let log = |channel: Channel, subject: Option<&str>, template: &str, outcome: &SendOutcome| {
        NewNotificationLog {
            registration_id: Some(registration.id),
            channel,
            old_stage: item.old_stage.clone(),
            new_stage: Some(item.new_stage.clone()),
            subject: subject.map(String::from),
            template: template.to_string(),
            provider_message_id: outcome.provider_message_id.clone(),
            delivered: outcome.success,
            delivery_error: outcome.error.clone(),
            sent_at: now,
        }
    };

    let preference = registration.notification_preference;
    if preference == NotificationPreference::None {
        let skipped = SendOutcome::failed("preference_none");
        record_attempt(app, &log(Channel::None, None, "skipped", &skipped)).await;
        return Ok(Some(Note::SkippedPreferenceNone));
    }

    let Ok(new_stage) = item.new_stage.parse::<Stage>() else {
        tracing::warn!("notification has an unknown stage");
        return Ok(Some(Note::UnknownStage));
    };
    // An unknown prior stage only loses the "previous step" line.
    let old_stage = item
        .old_stage
        .as_deref()
        .and_then(|stage| stage.parse::<Stage>().ok());

    let RegistrationNotice {
        kind,
        sms_body,
        email_subject,
        email_html,
    } = app
        .renderer
        .render_registration_notice(&registration, old_stage, new_stage)
        .context("rendering registration notice")?;

    let phone = registration.customer_phone.as_deref().and_then(to_e164);
    let email = registration.customer_email.as_deref().and_then(valid_email);
    let (mut attempted, mut failed) = (0, 0);
    let mut sms_failed = false;

    if let (true, Some(phone)) = (preference.wants_sms(), &phone) {
        let outcome = app.sms.send(phone, &sms_body).await;
        record_attempt(app, &log(Channel::Sms, None, kind.name(), &outcome)).await;

        attempted += 1;
        if !outcome.success {
            sms_failed = true;
            failed += 1;
        }
    }

    let email_channel = if preference.wants_email() {
        Some(Channel::Email)
    } else if sms_failed {
        Some(Channel::EmailFallback)
    } else {
        None
    };
    if let (Some(channel), Some(email)) = (email_channel, email) {
        if channel == Channel::EmailFallback {
            tracing::info!("sms failed, falling back to email");
        }
        let outcome = app.email.send(email, &email_subject, &email_html).await;
        record_attempt(app, &log(channel, Some(&email_subject), kind.name(), &outcome)).await;

        attempted += 1;
        if !outcome.success {
            failed += 1;
        }
    }

    Ok(if attempted == 0 {
        tracing::warn!(%preference, "no usable contact info for notification");
        Some(Note::NoContactInfo)
    } else if failed == attempted {
        Some(Note::AllChannelsFailed)
    } else {
        None
    })
}

/// Writes an audit log entry. A failure to log is reported and otherwise
/// ignored, so that it never prevents delivery on another channel.
async fn record_attempt<SMS: SmsSender, EM: EmailSender>(
    app: &App<SMS, EM>,
    entry: &NewNotificationLog,
) {
    if let Err(error) = app.store.insert_notification_log(entry).await {
        tracing::error!(?error, channel = %entry.channel, "failed to log notification attempt");
    }
}
