//! The notify agent runs the two notification pipelines of the dealership:
//!
//! - Plate alerts (`alerts`): detects plate custody problems, keeps the
//!   `plate_alerts` table in sync with them, and sends a batched digest to
//!   the dealership admin.
//! - The notification queue (`queue`): delivers registration stage changes
//!   to customers by SMS, email, or both.
//!
//! Each pipeline run is a single-shot, sequential pass over the durable store
//! which is triggered over HTTP by an external scheduler (see `api`), or by
//! the agent itself when a tick interval is configured. Nothing is carried in
//! memory between runs other than the `App`, which is built once at startup.
pub mod alerts;
pub mod api;
pub mod logging;
pub mod queue;
pub mod senders;
mod store;

#[cfg(test)]
pub(crate) mod test_util;

pub use store::{PgStore, Store};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Everything that a pipeline run needs. The `renderer` and senders are
/// constructed once, and the `App` is shared by reference with every run.
pub struct App<SMS, EM> {
    pub store: Box<dyn Store>,
    pub renderer: notifications::Renderer,
    pub sms: SMS,
    pub email: EM,
    pub settings: Settings,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Destination of plate alert digests by SMS. Digests are not sent by SMS if unset.
    pub admin_phone: Option<String>,
    /// Destination of plate alert digests by email. Digests are not emailed if unset.
    pub admin_email: Option<String>,
    /// Offset of the dealership's local time, which determines the calendar
    /// day used by day-granularity date comparisons.
    pub local_offset: FixedOffset,
    /// Minimum time between two notifications which include the same alert.
    pub alert_cooldown: chrono::Duration,
    /// Maximum number of queue items processed by a single run.
    pub queue_batch_size: usize,
}

impl Settings {
    /// Returns the dealership's calendar day at `now`.
    pub fn local_today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.local_offset).date_naive()
    }
}
