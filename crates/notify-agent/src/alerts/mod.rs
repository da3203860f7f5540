//! Plate alerts overview
//!
//! The `plate_alerts` table holds every alert which has been opened about a
//! plate, both open alerts and those since resolved. An alert is open while
//! `resolved_at` is null, and there's at most one open alert for each plate
//! and alert type. That uniqueness is enforced by the store, so overlapping
//! runs can't open duplicates.
//!
//! Each run of the pipeline happens in three steps:
//!
//! - detector: evaluates the current state of plates, assignments, and
//!   bookings against the alert rules, from scratch. It keeps no state.
//! - evaluator: reconciles detected conditions with the open alerts. New
//!   conditions open alerts, open alerts which are no longer detected are
//!   resolved, and alerts whose notification cooldown has elapsed are
//!   selected for notification.
//! - notifier: sends one digest of the selected alerts to the admin, by SMS
//!   and by email, and records each attempt in the notification log.
//!
//! An alert is stamped as notified whenever a digest which includes it is
//! attempted on any channel, whether or not the attempt succeeded. A provider
//! which is down will be retried once the cooldown elapses.
//!
//! A rule which fails to evaluate confirms nothing about its alert type, so
//! open alerts of that type are left as they are: neither resolved nor
//! notified until a run in which the rule succeeds.
//!
//! An open alert which is due for notification, but which isn't detected in
//! the current run, is never notified: it gets resolved instead. So an alert
//! opened by a run which could not notify (no admin destination was
//! configured, say) is dropped silently if its condition clears before the
//! next run.
mod detector;
mod evaluator;
mod notifier;

pub use detector::{
    detect, expiring_buyer_tags, overdue_rentals, unaccounted_plates, AssignmentContext,
    Detection, EXPIRY_URGENT_DAYS, EXPIRY_WINDOW_DAYS, OVERDUE_URGENT_DAYS,
};
pub use evaluator::{alerts_to_notify, alerts_to_resolve, run_plate_alerts, AlertRunSummary};
pub use notifier::send_digest;
