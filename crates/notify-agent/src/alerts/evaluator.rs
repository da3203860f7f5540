use super::{detector, notifier};
use crate::senders::{EmailSender, SmsSender};
use crate::App;
use anyhow::Context;
use models::{AlertKey, DetectedAlert, PlateAlert};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Counts of what a plate alerts run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AlertRunSummary {
    /// Conditions detected by this run.
    pub detected: usize,
    /// Alerts newly opened by this run.
    pub opened: usize,
    /// Open alerts which were resolved because they're no longer detected.
    pub resolved: usize,
    /// Alerts included in a digest which was sent (or attempted) by this run.
    pub notified: usize,
}

/// Returns the ids of `open_alerts` whose condition is not among `detected`.
pub fn alerts_to_resolve(detected: &[DetectedAlert], open_alerts: &[PlateAlert]) -> Vec<Uuid> {
    let detected: HashSet<AlertKey> = detected.iter().map(DetectedAlert::key).collect();

    open_alerts
        .iter()
        .filter(|alert| alert.resolved_at.is_none() && !detected.contains(&alert.key()))
        .map(|alert| alert.id)
        .collect()
}

/// Matches the alerts which are due for notification against this run's
/// detections. Returns the ids of matched alerts, and the detections which
/// describe them. Due alerts without a matching detection are skipped.
pub fn alerts_to_notify(
    detected: &[DetectedAlert],
    due_alerts: &[PlateAlert],
) -> (Vec<Uuid>, Vec<DetectedAlert>) {
    let detected: HashMap<AlertKey, &DetectedAlert> =
        detected.iter().map(|alert| (alert.key(), alert)).collect();

    let mut ids = Vec::new();
    let mut batch = Vec::new();
    for alert in due_alerts.iter().filter(|a| a.resolved_at.is_none()) {
        let Some(matched) = detected.get(&alert.key()) else {
            tracing::debug!(alert_id = %alert.id, alert_type = %alert.alert_type, "skipping due alert which was not detected");
            continue;
        };
        ids.push(alert.id);
        batch.push((*matched).clone());
    }
    (ids, batch)
}

/// Runs the plate alerts pipeline once: detect, reconcile, and notify.
///
/// Store errors are fatal to the run, except those of individual detection
/// rules, which cause that rule to be skipped and its open alerts to be left
/// unresolved. Mutations which happened before a fatal error are kept.
#[tracing::instrument(skip_all)]
pub async fn run_plate_alerts<SMS: SmsSender, EM: EmailSender>(
    app: &App<SMS, EM>,
) -> anyhow::Result<AlertRunSummary> {
    let store = app.store.as_ref();
    let now = store.current_time();
    let today = app.settings.local_today(now);

    let detector::Detection {
        alerts: detected,
        failed,
    } = detector::detect(store, today).await;
    let mut summary = AlertRunSummary {
        detected: detected.len(),
        ..Default::default()
    };

    for alert in &detected {
        if store.open_alert(alert, now).await? {
            tracing::info!(
                plate = %alert.plate_number,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                "opened plate alert"
            );
            summary.opened += 1;
        }
    }

    let mut open_alerts = store.fetch_open_alerts().await?;
    open_alerts.retain(|alert| !failed.contains(&alert.alert_type));
    let resolve = alerts_to_resolve(&detected, &open_alerts);
    if !resolve.is_empty() {
        summary.resolved = store.resolve_alerts(&resolve, now).await? as usize;
        tracing::info!(resolved = summary.resolved, "resolved plate alerts");
    }

    let cutoff = now - app.settings.alert_cooldown;
    let due_alerts = store.fetch_alerts_due_for_notification(cutoff).await?;
    let (notify_ids, batch) = alerts_to_notify(&detected, &due_alerts);

    if !batch.is_empty() {
        let attempted = notifier::send_digest(app, &batch, now)
            .await
            .context("sending plate alert digest")?;

        if attempted {
            store.mark_alerts_notified(&notify_ids, now).await?;
            summary.notified = notify_ids.len();
        }
    }

    tracing::info!(?summary, "finished plate alerts run");
    Ok(summary)
}
