use crate::Store;
use anyhow::Context;
use chrono::NaiveDate;
use models::{
    AlertKey, AlertType, AssignmentType, DetectedAlert, Plate, PlateAssignment, PlateStatus,
    PlateType, Registration, RentalBooking, Severity,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Rentals overdue by at least this many days are urgent.
pub const OVERDUE_URGENT_DAYS: i64 = 3;
/// Buyer's tags are alerted once they expire within this many days.
pub const EXPIRY_WINDOW_DAYS: i64 = 14;
/// Buyer's tags expiring within this many days are urgent.
pub const EXPIRY_URGENT_DAYS: i64 = 7;

/// Conditions detected by one evaluation of the rules.
#[derive(Debug, Default)]
pub struct Detection {
    /// At most one alert per plate and alert type.
    pub alerts: Vec<DetectedAlert>,
    /// Rules which failed, and so detected nothing about their alert type.
    pub failed: Vec<AlertType>,
}

/// Detects every plate condition which holds on the calendar day `today`.
/// Each rule runs independently: a rule which fails is logged and reported
/// in `Detection::failed`, and the other rules still run.
#[tracing::instrument(skip(store))]
pub async fn detect(store: &dyn Store, today: NaiveDate) -> Detection {
    let mut detected = Vec::new();
    let mut failed = Vec::new();

    for alert_type in AlertType::all() {
        let result = match alert_type {
            AlertType::OverdueRental => fetch_overdue_rentals(store, today).await,
            AlertType::ExpiringBuyerTag => fetch_expiring_buyer_tags(store, today).await,
            AlertType::Unaccounted => fetch_unaccounted_plates(store).await,
        };
        match result {
            Ok(alerts) => {
                tracing::debug!(rule = %alert_type, count = alerts.len(), "evaluated plate alert rule");
                detected.extend(alerts);
            }
            Err(error) => {
                tracing::error!(rule = %alert_type, error = ?error, "plate alert rule failed");
                failed.push(*alert_type);
            }
        }
    }

    Detection {
        alerts: dedup_by_key(detected),
        failed,
    }
}

/// Collapses alerts having the same key, keeping the most severe. A plate
/// can only be alerted once per type, even if (for example) it has two
/// overdue rental assignments.
fn dedup_by_key(detected: Vec<DetectedAlert>) -> Vec<DetectedAlert> {
    let mut index: HashMap<AlertKey, usize> = HashMap::new();
    let mut out: Vec<DetectedAlert> = Vec::with_capacity(detected.len());

    for alert in detected {
        match index.get(&alert.key()) {
            Some(&i) => {
                if alert.severity > out[i].severity {
                    out[i] = alert;
                }
            }
            None => {
                index.insert(alert.key(), out.len());
                out.push(alert);
            }
        }
    }
    out
}

/// Linked records which describe who holds a plate, and in what vehicle.
#[derive(Debug, Default)]
pub struct AssignmentContext {
    pub registrations: HashMap<Uuid, Registration>,
    pub bookings: HashMap<Uuid, RentalBooking>,
}

impl AssignmentContext {
    /// Fetches the registrations and bookings linked by `assignments`.
    pub async fn fetch(
        store: &dyn Store,
        assignments: &[PlateAssignment],
    ) -> anyhow::Result<AssignmentContext> {
        let registration_ids: Vec<Uuid> =
            assignments.iter().filter_map(|a| a.registration_id).collect();
        let booking_ids: Vec<Uuid> = assignments.iter().filter_map(|a| a.booking_id).collect();

        let registrations = store
            .fetch_registrations(&registration_ids)
            .await
            .context("fetching registrations of plate assignments")?;
        let bookings = store
            .fetch_bookings(&booking_ids)
            .await
            .context("fetching bookings of plate assignments")?;

        Ok(AssignmentContext {
            registrations: registrations.into_iter().map(|r| (r.id, r)).collect(),
            bookings: bookings.into_iter().map(|b| (b.id, b)).collect(),
        })
    }

    pub fn booking(&self, assignment: &PlateAssignment) -> Option<&RentalBooking> {
        assignment.booking_id.and_then(|id| self.bookings.get(&id))
    }

    fn registration(&self, assignment: &PlateAssignment) -> Option<&Registration> {
        assignment
            .registration_id
            .and_then(|id| self.registrations.get(&id))
    }

    /// Describes the vehicle of the assignment's registration, or else of its booking.
    pub fn vehicle(&self, assignment: &PlateAssignment) -> Option<String> {
        self.registration(assignment)
            .and_then(Registration::vehicle_description)
            .or_else(|| {
                self.booking(assignment)
                    .and_then(RentalBooking::vehicle_description)
            })
    }

    /// Returns a new alert about `plate`, carrying the customer and vehicle
    /// context of its `assignment`, if any.
    fn alert(
        &self,
        plate: &Plate,
        alert_type: AlertType,
        severity: Severity,
        assignment: Option<&PlateAssignment>,
    ) -> DetectedAlert {
        let registration = assignment.and_then(|a| self.registration(a));

        DetectedAlert {
            plate_id: plate.id,
            plate_number: plate.plate_number.clone(),
            alert_type,
            severity,
            customer_name: assignment
                .and_then(|a| a.customer_name.clone())
                .or_else(|| registration.map(|r| r.customer_name.clone())),
            customer_phone: assignment
                .and_then(|a| a.customer_phone.clone())
                .or_else(|| registration.and_then(|r| r.customer_phone.clone())),
            vehicle_info: assignment.and_then(|a| self.vehicle(a)),
            days_overdue: None,
            days_until_expiry: None,
            reason: None,
        }
    }
}

async fn fetch_overdue_rentals(
    store: &dyn Store,
    today: NaiveDate,
) -> anyhow::Result<Vec<DetectedAlert>> {
    let assignments: Vec<PlateAssignment> = store
        .fetch_active_assignments()
        .await?
        .into_iter()
        .filter(|a| a.assignment_type == AssignmentType::Rental)
        .collect();
    if assignments.is_empty() {
        return Ok(Vec::new());
    }

    let plate_ids: Vec<Uuid> = assignments.iter().map(|a| a.plate_id).collect();
    let plates = store.fetch_plates(&plate_ids).await?;
    let context = AssignmentContext::fetch(store, &assignments).await?;

    Ok(overdue_rentals(today, &assignments, &plates, &context))
}

/// Evaluates active rental `assignments` for rentals which were due back
/// before `today`.
pub fn overdue_rentals(
    today: NaiveDate,
    assignments: &[PlateAssignment],
    plates: &[Plate],
    context: &AssignmentContext,
) -> Vec<DetectedAlert> {
    let plates: HashMap<Uuid, &Plate> = plates.iter().map(|p| (p.id, p)).collect();
    let mut alerts = Vec::new();

    for assignment in assignments {
        if !assignment.is_active() || assignment.assignment_type != AssignmentType::Rental {
            continue;
        }
        let Some(expected) = assignment.expected_return_date else {
            continue;
        };
        let days_overdue = (today - expected).num_days();
        if days_overdue < 1 {
            continue;
        }
        let Some(plate) = plates.get(&assignment.plate_id) else {
            tracing::warn!(assignment_id = %assignment.id, plate_id = %assignment.plate_id, "rental assignment references a missing plate");
            continue;
        };

        let severity = if days_overdue >= OVERDUE_URGENT_DAYS {
            Severity::Urgent
        } else {
            Severity::Warning
        };
        let mut alert = context.alert(plate, AlertType::OverdueRental, severity, Some(assignment));
        alert.days_overdue = Some(days_overdue);
        alerts.push(alert);
    }
    alerts
}

async fn fetch_expiring_buyer_tags(
    store: &dyn Store,
    today: NaiveDate,
) -> anyhow::Result<Vec<DetectedAlert>> {
    let plates: Vec<Plate> = store
        .fetch_plates_of_type(PlateType::BuyerTag)
        .await?
        .into_iter()
        .filter(|p| expiring_within_window(p, today).is_some())
        .collect();
    if plates.is_empty() {
        return Ok(Vec::new());
    }

    // Holder context is best-effort, and its absence doesn't suppress alerts.
    let plate_ids: Vec<Uuid> = plates.iter().map(|p| p.id).collect();
    let (assignments, context) = match fetch_holders(store, &plate_ids).await {
        Ok(found) => found,
        Err(error) => {
            tracing::warn!(?error, "failed to fetch holders of expiring buyer's tags");
            (Vec::new(), AssignmentContext::default())
        }
    };

    Ok(expiring_buyer_tags(today, &plates, &assignments, &context))
}

async fn fetch_holders(
    store: &dyn Store,
    plate_ids: &[Uuid],
) -> anyhow::Result<(Vec<PlateAssignment>, AssignmentContext)> {
    let assignments = store.fetch_active_assignments_for_plates(plate_ids).await?;
    let context = AssignmentContext::fetch(store, &assignments).await?;
    Ok((assignments, context))
}

/// Returns the days until the plate's expiration, if it's a buyer's tag not
/// already marked expired, which expires within the alert window.
fn expiring_within_window(plate: &Plate, today: NaiveDate) -> Option<i64> {
    if plate.plate_type != PlateType::BuyerTag || plate.status == PlateStatus::Expired {
        return None;
    }
    let days = (plate.expiration_date? - today).num_days();
    (days <= EXPIRY_WINDOW_DAYS).then_some(days)
}

/// Evaluates `plates` for buyer's tags expiring within the alert window,
/// including tags past their expiration which are not yet marked expired.
pub fn expiring_buyer_tags(
    today: NaiveDate,
    plates: &[Plate],
    active_assignments: &[PlateAssignment],
    context: &AssignmentContext,
) -> Vec<DetectedAlert> {
    let holders = newest_active_by_plate(active_assignments);
    let mut alerts = Vec::new();

    for plate in plates {
        let Some(days_until_expiry) = expiring_within_window(plate, today) else {
            continue;
        };
        let severity = if days_until_expiry <= EXPIRY_URGENT_DAYS {
            Severity::Urgent
        } else {
            Severity::Warning
        };
        let holder = holders.get(&plate.id).and_then(|all| all.first().copied());

        let mut alert = context.alert(plate, AlertType::ExpiringBuyerTag, severity, holder);
        alert.days_until_expiry = Some(days_until_expiry);
        alerts.push(alert);
    }
    alerts
}

async fn fetch_unaccounted_plates(store: &dyn Store) -> anyhow::Result<Vec<DetectedAlert>> {
    let plates = store.fetch_plates_with_status(PlateStatus::Assigned).await?;
    if plates.is_empty() {
        return Ok(Vec::new());
    }

    let plate_ids: Vec<Uuid> = plates.iter().map(|p| p.id).collect();
    let assignments = store.fetch_active_assignments_for_plates(&plate_ids).await?;
    let context = AssignmentContext::fetch(store, &assignments).await?;

    Ok(unaccounted_plates(&plates, &assignments, &context))
}

/// Evaluates `assigned` plates for a missing or inconsistent active assignment.
/// Where a plate has several active assignments, the newest is checked.
pub fn unaccounted_plates(
    plates: &[Plate],
    active_assignments: &[PlateAssignment],
    context: &AssignmentContext,
) -> Vec<DetectedAlert> {
    let by_plate = newest_active_by_plate(active_assignments);
    let mut alerts = Vec::new();

    for plate in plates.iter().filter(|p| p.status == PlateStatus::Assigned) {
        let active = by_plate.get(&plate.id).map(Vec::as_slice).unwrap_or_default();

        let Some(&newest) = active.first() else {
            let mut alert = context.alert(plate, AlertType::Unaccounted, Severity::Urgent, None);
            alert.reason = Some("marked assigned, but has no active assignment".to_string());
            alerts.push(alert);
            continue;
        };

        let (severity, reason) = if let Some(booking) =
            context.booking(newest).filter(|b| b.status.is_closed())
        {
            (
                Severity::Urgent,
                format!("assigned to a booking which is {}", booking.status),
            )
        } else if !newest.has_business_reference()
            && newest.assignment_type != AssignmentType::Inventory
        {
            (
                Severity::Warning,
                format!("{} assignment has no linked booking or registration", newest.assignment_type),
            )
        } else if active.len() > 1 {
            (
                Severity::Warning,
                format!("has {} active assignments", active.len()),
            )
        } else {
            continue;
        };

        let mut alert = context.alert(plate, AlertType::Unaccounted, severity, Some(newest));
        alert.reason = Some(reason);
        alerts.push(alert);
    }
    alerts
}

/// Indexes active assignments by plate, newest first.
fn newest_active_by_plate(
    assignments: &[PlateAssignment],
) -> HashMap<Uuid, Vec<&PlateAssignment>> {
    let mut by_plate: HashMap<Uuid, Vec<&PlateAssignment>> = HashMap::new();
    for assignment in assignments.iter().filter(|a| a.is_active()) {
        by_plate.entry(assignment.plate_id).or_default().push(assignment);
    }
    for all in by_plate.values_mut() {
        all.sort_by(|l, r| r.assigned_at.cmp(&l.assigned_at));
    }
    by_plate
}
