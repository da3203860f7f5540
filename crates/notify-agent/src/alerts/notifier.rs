use crate::senders::{to_e164, valid_email, EmailSender, SendOutcome, SmsSender};
use crate::App;
use anyhow::Context;
use chrono::{DateTime, Utc};
use models::{Channel, DetectedAlert, NewNotificationLog};
use notifications::MessageKind;

/// Sends one digest of `alerts` to each configured admin destination, and
/// records every attempt in the notification log. Returns whether any channel
/// was attempted, regardless of whether the attempt succeeded.
#[tracing::instrument(skip_all, fields(alerts = alerts.len()))]
pub async fn send_digest<SMS: SmsSender, EM: EmailSender>(
    app: &App<SMS, EM>,
    alerts: &[DetectedAlert],
    now: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let digest = app
        .renderer
        .render_plate_alert_digest(alerts)
        .context("rendering plate alert digest")?;
    let mut attempted = false;

    match app.settings.admin_phone.as_deref().map(|p| (p, to_e164(p))) {
        Some((_, Some(phone))) => {
            let outcome = app.sms.send(&phone, &digest.sms_body).await;
            record_attempt(app, Channel::Sms, None, &outcome, now).await;
            attempted = true;
        }
        Some((phone, None)) => {
            tracing::warn!(%phone, "admin phone is not a valid phone number, skipping plate alert sms");
        }
        None => tracing::debug!("no admin phone configured, skipping plate alert sms"),
    }

    match app.settings.admin_email.as_deref().map(|e| (e, valid_email(e))) {
        Some((_, Some(email))) => {
            let outcome = app
                .email
                .send(email, &digest.email_subject, &digest.email_html)
                .await;
            record_attempt(app, Channel::Email, Some(&digest.email_subject), &outcome, now).await;
            attempted = true;
        }
        Some((email, None)) => {
            tracing::warn!(%email, "admin email is not a valid address, skipping plate alert email");
        }
        None => tracing::debug!("no admin email configured, skipping plate alert email"),
    }

    if !attempted {
        tracing::warn!(
            total = digest.total,
            urgent = digest.urgent_count,
            "no admin destination is configured, plate alerts were not sent"
        );
    }
    Ok(attempted)
}

/// Logs a digest attempt. Failures to log are reported and otherwise ignored.
async fn record_attempt<SMS: SmsSender, EM: EmailSender>(
    app: &App<SMS, EM>,
    channel: Channel,
    subject: Option<&str>,
    outcome: &SendOutcome,
    now: DateTime<Utc>,
) {
    let entry = NewNotificationLog {
        registration_id: None,
        channel,
        old_stage: None,
        new_stage: None,
        subject: subject.map(String::from),
        template: MessageKind::PlateAlertDigest.name().to_string(),
        provider_message_id: outcome.provider_message_id.clone(),
        delivered: outcome.success,
        delivery_error: outcome.error.clone(),
        sent_at: now,
    };
    if let Err(error) = app.store.insert_notification_log(&entry).await {
        tracing::error!(?error, %channel, "failed to log plate alert digest attempt");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{self, MockStore, TestEmailSender, TestSmsSender};
    use models::{AlertType, Severity};

    fn batch() -> Vec<DetectedAlert> {
        vec![
            test_util::detected(1, AlertType::Unaccounted, Severity::Urgent),
            test_util::detected(2, AlertType::ExpiringBuyerTag, Severity::Warning),
        ]
    }

    #[tokio::test]
    async fn test_invalid_admin_destinations_are_skipped() {
        let store = MockStore::new(test_util::now());
        let (sms, email) = (TestSmsSender::default(), TestEmailSender::default());
        let mut app = test_util::app(&store, &sms, &email);

        // An unusable phone skips only the SMS.
        app.settings.admin_phone = Some("555-01".to_string());
        assert!(send_digest(&app, &batch(), test_util::now()).await.unwrap());
        assert!(sms.attempts().await.is_empty());
        assert_eq!(1, email.attempts().await.len());

        // With both unusable, nothing is attempted.
        app.settings.admin_email = Some("lot-at-dealer.test".to_string());
        assert!(!send_digest(&app, &batch(), test_util::now()).await.unwrap());
        assert!(sms.attempts().await.is_empty());
        assert_eq!(1, email.attempts().await.len());

        // An unusable email skips only the email, and the phone is normalized.
        app.settings.admin_phone = Some("(512) 555-0100".to_string());
        assert!(send_digest(&app, &batch(), test_util::now()).await.unwrap());
        let texts = sms.attempts().await;
        assert_eq!(1, texts.len());
        assert_eq!("+15125550100", texts[0].to);
        assert!(texts[0].delivered);
        assert_eq!(1, email.attempts().await.len());

        let channels: Vec<_> = store.with_tables(|t| t.log.iter().map(|l| l.channel).collect());
        assert_eq!(vec![Channel::Email, Channel::Sms], channels);
    }

    #[tokio::test]
    async fn test_failed_log_write_still_sends_every_channel() {
        let store = MockStore::new(test_util::now());
        let (sms, email) = (TestSmsSender::default(), TestEmailSender::default());
        let app = test_util::app(&store, &sms, &email);
        store.with_tables(|t| t.fail_log_inserts = true);

        assert!(send_digest(&app, &batch(), test_util::now()).await.unwrap());
        assert_eq!(1, sms.attempts().await.len());
        let emails = email.attempts().await;
        assert_eq!(1, emails.len());
        assert!(emails[0].delivered);
        assert_eq!("Plate alerts: 1 urgent, 2 total", emails[0].subject);
        assert!(store.with_tables(|t| t.log.is_empty()));
    }
}
