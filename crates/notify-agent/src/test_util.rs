use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use models::{
    AlertType, DetectedAlert, NewNotificationLog, NotificationQueueItem, Plate, PlateAlert,
    PlateAssignment, PlateStatus, PlateType, Registration, RentalBooking, Severity,
};
use uuid::Uuid;

use crate::senders::{EmailSender, SendOutcome, SmsSender};
use crate::{App, Settings, Store};

/// The time at which every test starts.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 18, 0, 0).unwrap()
}

/// The dealership's calendar day at `now()`.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

pub fn app(
    store: &MockStore,
    sms: &TestSmsSender,
    email: &TestEmailSender,
) -> App<TestSmsSender, TestEmailSender> {
    App {
        store: Box::new(store.clone()),
        renderer: notifications::Renderer::try_new(
            url::Url::parse("https://dealer.test/").unwrap(),
            "Lone Star Motors",
        )
        .unwrap(),
        sms: sms.clone(),
        email: email.clone(),
        settings: Settings {
            admin_phone: Some("+15125550100".to_string()),
            admin_email: Some("lot@dealer.test".to_string()),
            local_offset: chrono::FixedOffset::west_opt(6 * 3600).unwrap(),
            alert_cooldown: chrono::Duration::hours(24),
            queue_batch_size: 100,
        },
    }
}

/// Serves `router` on an ephemeral local port, returning its base url.
pub async fn serve_locally(router: axum::Router) -> url::Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    url::Url::parse(&format!("http://{addr}/")).unwrap()
}

pub fn detected(n: u128, alert_type: AlertType, severity: Severity) -> DetectedAlert {
    DetectedAlert {
        plate_id: Uuid::from_u128(0xa000 + n),
        plate_number: format!("TX-{n:04}"),
        alert_type,
        severity,
        customer_name: None,
        customer_phone: None,
        vehicle_info: None,
        days_overdue: None,
        days_until_expiry: None,
        reason: None,
    }
}

/// An open alert about plate `plate_n` which has never been notified.
pub fn open_alert(id: u128, plate_n: u128, alert_type: AlertType) -> PlateAlert {
    PlateAlert {
        id: Uuid::from_u128(id),
        plate_id: Uuid::from_u128(0xa000 + plate_n),
        alert_type,
        severity: Severity::Warning,
        first_detected_at: now() - chrono::Duration::days(1),
        last_notified_at: None,
        resolved_at: None,
    }
}

/// The rows of the mock store, plus switches which inject failures.
#[derive(Debug, Default)]
pub struct Tables {
    pub registrations: Vec<Registration>,
    pub queue: Vec<NotificationQueueItem>,
    pub log: Vec<NewNotificationLog>,
    pub plates: Vec<Plate>,
    pub assignments: Vec<PlateAssignment>,
    pub bookings: Vec<RentalBooking>,
    pub alerts: Vec<PlateAlert>,

    /// Fail every call.
    pub unreachable: bool,
    /// Fail fetches of plates by type.
    pub fail_plates_of_type: bool,
    /// Fail fetches of this registration.
    pub failing_registration: Option<Uuid>,
    /// Fail inserts into the notification log.
    pub fail_log_inserts: bool,
    /// Queue items which another run has claimed in the meantime.
    pub claimed_elsewhere: Vec<Uuid>,
}

/// An in-memory `Store` with a controllable clock.
#[derive(Debug, Clone)]
pub struct MockStore {
    inner: Arc<MockStoreInner>,
}

#[derive(Debug)]
struct MockStoreInner {
    time: Mutex<DateTime<Utc>>,
    tables: Mutex<Tables>,
}

impl MockStore {
    pub fn new(now: DateTime<Utc>) -> MockStore {
        MockStore {
            inner: Arc::new(MockStoreInner {
                time: Mutex::new(now),
                tables: Mutex::new(Tables::default()),
            }),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.inner.time.lock().unwrap() += by;
    }

    pub fn with_tables<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = self.inner.tables.lock().unwrap();
        f(&mut *tables)
    }

    /// Like `with_tables`, but fails if the store is unreachable.
    fn tables<R>(&self, f: impl FnOnce(&mut Tables) -> anyhow::Result<R>) -> anyhow::Result<R> {
        self.with_tables(|t| {
            if t.unreachable {
                anyhow::bail!("store is unreachable");
            }
            f(t)
        })
    }
}

#[async_trait::async_trait]
impl Store for MockStore {
    fn current_time(&self) -> DateTime<Utc> {
        *self.inner.time.lock().unwrap()
    }

    async fn fetch_registration(&self, id: Uuid) -> anyhow::Result<Option<Registration>> {
        self.tables(|t| {
            if t.failing_registration == Some(id) {
                anyhow::bail!("registration {id} is unreadable");
            }
            Ok(t.registrations.iter().find(|r| r.id == id).cloned())
        })
    }

    async fn fetch_registrations(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Registration>> {
        self.tables(|t| {
            Ok(t.registrations
                .iter()
                .filter(|r| ids.contains(&r.id))
                .cloned()
                .collect())
        })
    }

    async fn fetch_due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<NotificationQueueItem>> {
        self.tables(|t| {
            let mut due: Vec<_> = t.queue.iter().filter(|i| i.is_due(now)).cloned().collect();
            due.sort_by_key(|i| (i.send_after, i.created_at));
            due.truncate(limit);
            Ok(due)
        })
    }

    async fn claim_notification(&self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<bool> {
        self.tables(|t| {
            if t.claimed_elsewhere.contains(&id) {
                return Ok(false);
            }
            match t.queue.iter_mut().find(|i| i.id == id && !i.sent) {
                Some(item) => {
                    item.sent = true;
                    item.sent_at = Some(now);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    async fn set_notification_error(&self, id: Uuid, error: &str) -> anyhow::Result<()> {
        self.tables(|t| {
            for item in t.queue.iter_mut().filter(|i| i.id == id) {
                item.error = Some(error.to_string());
            }
            Ok(())
        })
    }

    async fn insert_notification_log(&self, entry: &NewNotificationLog) -> anyhow::Result<()> {
        self.tables(|t| {
            if t.fail_log_inserts {
                anyhow::bail!("notification log is unavailable");
            }
            t.log.push(entry.clone());
            Ok(())
        })
    }

    async fn fetch_plates(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Plate>> {
        self.tables(|t| Ok(t.plates.iter().filter(|p| ids.contains(&p.id)).cloned().collect()))
    }

    async fn fetch_plates_with_status(&self, status: PlateStatus) -> anyhow::Result<Vec<Plate>> {
        self.tables(|t| Ok(t.plates.iter().filter(|p| p.status == status).cloned().collect()))
    }

    async fn fetch_plates_of_type(&self, plate_type: PlateType) -> anyhow::Result<Vec<Plate>> {
        self.tables(|t| {
            if t.fail_plates_of_type {
                anyhow::bail!("plates of type {plate_type} are unreadable");
            }
            Ok(t.plates
                .iter()
                .filter(|p| p.plate_type == plate_type)
                .cloned()
                .collect())
        })
    }

    async fn fetch_active_assignments(&self) -> anyhow::Result<Vec<PlateAssignment>> {
        self.tables(|t| Ok(t.assignments.iter().filter(|a| a.is_active()).cloned().collect()))
    }

    async fn fetch_active_assignments_for_plates(
        &self,
        plate_ids: &[Uuid],
    ) -> anyhow::Result<Vec<PlateAssignment>> {
        self.tables(|t| {
            Ok(t.assignments
                .iter()
                .filter(|a| a.is_active() && plate_ids.contains(&a.plate_id))
                .cloned()
                .collect())
        })
    }

    async fn fetch_bookings(&self, ids: &[Uuid]) -> anyhow::Result<Vec<RentalBooking>> {
        self.tables(|t| Ok(t.bookings.iter().filter(|b| ids.contains(&b.id)).cloned().collect()))
    }

    async fn open_alert(&self, alert: &DetectedAlert, now: DateTime<Utc>) -> anyhow::Result<bool> {
        self.tables(|t| {
            let key = alert.key();
            if t.alerts.iter().any(|a| a.resolved_at.is_none() && a.key() == key) {
                return Ok(false);
            }
            t.alerts.push(PlateAlert {
                id: Uuid::new_v4(),
                plate_id: alert.plate_id,
                alert_type: alert.alert_type,
                severity: alert.severity,
                first_detected_at: now,
                last_notified_at: None,
                resolved_at: None,
            });
            Ok(true)
        })
    }

    async fn fetch_open_alerts(&self) -> anyhow::Result<Vec<PlateAlert>> {
        self.tables(|t| {
            Ok(t.alerts
                .iter()
                .filter(|a| a.resolved_at.is_none())
                .cloned()
                .collect())
        })
    }

    async fn fetch_alerts_due_for_notification(
        &self,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PlateAlert>> {
        self.tables(|t| {
            Ok(t.alerts
                .iter()
                .filter(|a| {
                    a.resolved_at.is_none() && a.last_notified_at.map_or(true, |at| at < cutoff)
                })
                .cloned()
                .collect())
        })
    }

    async fn resolve_alerts(&self, ids: &[Uuid], now: DateTime<Utc>) -> anyhow::Result<u64> {
        self.tables(|t| {
            let mut count = 0;
            for alert in t.alerts.iter_mut() {
                if ids.contains(&alert.id) && alert.resolved_at.is_none() {
                    alert.resolved_at = Some(now);
                    count += 1;
                }
            }
            Ok(count)
        })
    }

    async fn mark_alerts_notified(&self, ids: &[Uuid], now: DateTime<Utc>) -> anyhow::Result<u64> {
        self.tables(|t| {
            let mut count = 0;
            for alert in t.alerts.iter_mut().filter(|a| ids.contains(&a.id)) {
                alert.last_notified_at = Some(now);
                count += 1;
            }
            Ok(count)
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SentSms {
    pub to: String,
    pub body: String,
    pub delivered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub delivered: bool,
}

#[derive(Debug, Default)]
struct SenderState<T> {
    failing: bool,
    attempts: Vec<T>,
}

/// Records every SMS attempt. Succeeds unless set to fail.
#[derive(Debug, Clone, Default)]
pub struct TestSmsSender {
    state: Arc<tokio::sync::Mutex<SenderState<SentSms>>>,
}

impl TestSmsSender {
    pub async fn attempts(&self) -> Vec<SentSms> {
        self.state.lock().await.attempts.clone()
    }

    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }
}

impl SmsSender for TestSmsSender {
    async fn send<'s>(&'s self, to: &'s str, body: &'s str) -> SendOutcome {
        let mut state = self.state.lock().await;
        let delivered = !state.failing;
        state.attempts.push(SentSms {
            to: to.to_string(),
            body: body.to_string(),
            delivered,
        });
        if delivered {
            SendOutcome::delivered(format!("SM{:04}", state.attempts.len()))
        } else {
            SendOutcome::failed("mock sms failure")
        }
    }
}

/// Records every email attempt. Succeeds unless set to fail.
#[derive(Debug, Clone, Default)]
pub struct TestEmailSender {
    state: Arc<tokio::sync::Mutex<SenderState<SentEmail>>>,
}

impl TestEmailSender {
    pub async fn attempts(&self) -> Vec<SentEmail> {
        self.state.lock().await.attempts.clone()
    }

    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }
}

impl EmailSender for TestEmailSender {
    async fn send<'s>(&'s self, to: &'s str, subject: &'s str, html: &'s str) -> SendOutcome {
        let mut state = self.state.lock().await;
        let delivered = !state.failing;
        state.attempts.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
            delivered,
        });
        if delivered {
            SendOutcome::delivered(format!("em_{:04}", state.attempts.len()))
        } else {
            SendOutcome::failed("mock email failure")
        }
    }
}

/// Row builders. Each takes a small `n` which determines its id and
/// human-readable identifiers, so that assertions can refer to them.
pub mod fixtures {
    use super::now;
    use models::{
        AssignmentType, BookingStatus, NotificationPreference, NotificationQueueItem, Plate,
        PlateAssignment, PlateStatus, PlateType, Registration, RentalBooking, Stage,
    };
    use uuid::Uuid;

    pub fn plate(
        n: u128,
        plate_type: PlateType,
        status: PlateStatus,
        expiration_date: Option<chrono::NaiveDate>,
    ) -> Plate {
        Plate {
            id: Uuid::from_u128(0xa000 + n),
            plate_number: format!("TX-{n:04}"),
            plate_type,
            status,
            expiration_date,
        }
    }

    /// An active assignment of `plate`, with no customer or business reference.
    pub fn assignment(n: u128, plate: &Plate, assignment_type: AssignmentType) -> PlateAssignment {
        PlateAssignment {
            id: Uuid::from_u128(0xb000 + n),
            plate_id: plate.id,
            assignment_type,
            customer_name: None,
            customer_phone: None,
            booking_id: None,
            registration_id: None,
            expected_return_date: None,
            assigned_at: now() - chrono::Duration::days(10),
            returned_at: None,
        }
    }

    pub fn booking(n: u128, status: BookingStatus) -> RentalBooking {
        RentalBooking {
            id: Uuid::from_u128(0xc000 + n),
            status,
            vehicle_year: Some(2024),
            vehicle_make: Some("Ford".to_string()),
            vehicle_model: Some("Bronco".to_string()),
        }
    }

    pub fn registration(n: u128) -> Registration {
        Registration {
            id: Uuid::from_u128(0xd000 + n),
            order_id: format!("ORD-{n:04}"),
            access_token: format!("tok_{n}"),
            vehicle_year: Some(2019),
            vehicle_make: Some("Toyota".to_string()),
            vehicle_model: Some("Camry".to_string()),
            vin: Some("4T1B11HK5KU123456".to_string()),
            customer_name: format!("Customer {n}"),
            customer_phone: Some(format!("(512) 555-{:04}", 100 + n)),
            customer_email: Some(format!("customer{n}@example.test")),
            notification_preference: NotificationPreference::Both,
            stage: Stage::DmvProcessing,
            rejection_notes: None,
            created_at: now() - chrono::Duration::days(30),
        }
    }

    /// A queue item which became due a minute ago.
    pub fn queue_item(
        n: u128,
        registration_id: Option<Uuid>,
        old_stage: Option<&str>,
        new_stage: &str,
    ) -> NotificationQueueItem {
        let created_at = now() - chrono::Duration::minutes(10) + chrono::Duration::seconds(n as i64);
        NotificationQueueItem {
            id: Uuid::from_u128(0xe000 + n),
            registration_id,
            old_stage: old_stage.map(String::from),
            new_stage: new_stage.to_string(),
            send_after: now() - chrono::Duration::minutes(1),
            notify_customer: true,
            sent: false,
            sent_at: None,
            error: None,
            created_at,
        }
    }
}
