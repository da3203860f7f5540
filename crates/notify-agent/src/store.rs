use anyhow::Context;
use chrono::{DateTime, Utc};
use models::{
    DetectedAlert, NewNotificationLog, NotificationQueueItem, Plate, PlateAlert, PlateAssignment,
    PlateStatus, PlateType, Registration, RentalBooking,
};
use uuid::Uuid;

/// A trait for allowing the pipelines access to the durable store.
/// Every mutation is its own commit point: there are no transactions spanning
/// multiple calls, and a run which fails part way keeps the progress it made.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Returns the current time. Having pipelines access the current time through this api
    /// allows tests of pipelines to be deterministic.
    fn current_time(&self) -> DateTime<Utc>;

    async fn fetch_registration(&self, id: Uuid) -> anyhow::Result<Option<Registration>>;

    async fn fetch_registrations(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Registration>>;

    /// Fetches up to `limit` queue items which are unsent, addressed to the
    /// customer, and whose `send_after` is not after `now`.
    async fn fetch_due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<NotificationQueueItem>>;

    /// Atomically marks the queue item as sent if it was not already, and
    /// returns whether this caller did so.
    async fn claim_notification(&self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<bool>;

    async fn set_notification_error(&self, id: Uuid, error: &str) -> anyhow::Result<()>;

    async fn insert_notification_log(&self, entry: &NewNotificationLog) -> anyhow::Result<()>;

    async fn fetch_plates(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Plate>>;

    async fn fetch_plates_with_status(&self, status: PlateStatus) -> anyhow::Result<Vec<Plate>>;

    async fn fetch_plates_of_type(&self, plate_type: PlateType) -> anyhow::Result<Vec<Plate>>;

    async fn fetch_active_assignments(&self) -> anyhow::Result<Vec<PlateAssignment>>;

    async fn fetch_active_assignments_for_plates(
        &self,
        plate_ids: &[Uuid],
    ) -> anyhow::Result<Vec<PlateAssignment>>;

    async fn fetch_bookings(&self, ids: &[Uuid]) -> anyhow::Result<Vec<RentalBooking>>;

    /// Opens an alert for the detected condition unless an alert with the
    /// same plate and type is already open. Returns whether one was opened.
    async fn open_alert(&self, alert: &DetectedAlert, now: DateTime<Utc>) -> anyhow::Result<bool>;

    async fn fetch_open_alerts(&self) -> anyhow::Result<Vec<PlateAlert>>;

    /// Fetches open alerts which were never notified, or which were last
    /// notified before `cutoff`.
    async fn fetch_alerts_due_for_notification(
        &self,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PlateAlert>>;

    async fn resolve_alerts(&self, ids: &[Uuid], now: DateTime<Utc>) -> anyhow::Result<u64>;

    async fn mark_alerts_notified(&self, ids: &[Uuid], now: DateTime<Utc>) -> anyhow::Result<u64>;
}

/// The `Store` backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> PgStore {
        PgStore { pool }
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    fn current_time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn fetch_registration(&self, id: Uuid) -> anyhow::Result<Option<Registration>> {
        notify_sql::registrations::fetch_registration(id, &self.pool)
            .await
            .context("fetching registration")
    }

    async fn fetch_registrations(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Registration>> {
        notify_sql::registrations::fetch_registrations(ids, &self.pool)
            .await
            .context("fetching registrations")
    }

    async fn fetch_due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<NotificationQueueItem>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        notify_sql::queue::fetch_due(now, limit, &self.pool)
            .await
            .context("fetching due notifications")
    }

    async fn claim_notification(&self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<bool> {
        notify_sql::queue::claim(id, now, &self.pool)
            .await
            .context("claiming notification queue item")
    }

    async fn set_notification_error(&self, id: Uuid, error: &str) -> anyhow::Result<()> {
        notify_sql::queue::set_error(id, error, &self.pool)
            .await
            .context("annotating notification queue item")
    }

    async fn insert_notification_log(&self, entry: &NewNotificationLog) -> anyhow::Result<()> {
        notify_sql::notification_log::insert(entry, &self.pool)
            .await
            .context("inserting notification log entry")
    }

    async fn fetch_plates(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Plate>> {
        notify_sql::plates::fetch_plates(ids, &self.pool)
            .await
            .context("fetching plates")
    }

    async fn fetch_plates_with_status(&self, status: PlateStatus) -> anyhow::Result<Vec<Plate>> {
        notify_sql::plates::fetch_plates_with_status(status, &self.pool)
            .await
            .with_context(|| format!("fetching {status} plates"))
    }

    async fn fetch_plates_of_type(&self, plate_type: PlateType) -> anyhow::Result<Vec<Plate>> {
        notify_sql::plates::fetch_plates_of_type(plate_type, &self.pool)
            .await
            .with_context(|| format!("fetching {plate_type} plates"))
    }

    async fn fetch_active_assignments(&self) -> anyhow::Result<Vec<PlateAssignment>> {
        notify_sql::plates::fetch_active_assignments(&self.pool)
            .await
            .context("fetching active plate assignments")
    }

    async fn fetch_active_assignments_for_plates(
        &self,
        plate_ids: &[Uuid],
    ) -> anyhow::Result<Vec<PlateAssignment>> {
        notify_sql::plates::fetch_active_assignments_for_plates(plate_ids, &self.pool)
            .await
            .context("fetching active plate assignments")
    }

    async fn fetch_bookings(&self, ids: &[Uuid]) -> anyhow::Result<Vec<RentalBooking>> {
        notify_sql::plates::fetch_bookings(ids, &self.pool)
            .await
            .context("fetching rental bookings")
    }

    async fn open_alert(&self, alert: &DetectedAlert, now: DateTime<Utc>) -> anyhow::Result<bool> {
        notify_sql::alerts::open_alert(
            alert.plate_id,
            alert.alert_type,
            alert.severity,
            now,
            &self.pool,
        )
        .await
        .with_context(|| format!("opening {} alert for plate {}", alert.alert_type, alert.plate_number))
    }

    async fn fetch_open_alerts(&self) -> anyhow::Result<Vec<PlateAlert>> {
        notify_sql::alerts::fetch_open_alerts(&self.pool)
            .await
            .context("fetching open plate alerts")
    }

    async fn fetch_alerts_due_for_notification(
        &self,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PlateAlert>> {
        notify_sql::alerts::fetch_alerts_due_for_notification(cutoff, &self.pool)
            .await
            .context("fetching plate alerts due for notification")
    }

    async fn resolve_alerts(&self, ids: &[Uuid], now: DateTime<Utc>) -> anyhow::Result<u64> {
        notify_sql::alerts::resolve_alerts(ids, now, &self.pool)
            .await
            .context("resolving plate alerts")
    }

    async fn mark_alerts_notified(&self, ids: &[Uuid], now: DateTime<Utc>) -> anyhow::Result<u64> {
        notify_sql::alerts::mark_alerts_notified(ids, now, &self.pool)
            .await
            .context("marking plate alerts as notified")
    }
}
