//! Row-level access to the tables of the notification pipelines.
//!
//! Each function issues a single statement against the pool. There are no
//! multi-statement transactions: every mutation here is its own commit point.
//! `schema.sql` in this crate describes the columns these queries expect.
pub mod alerts;
pub mod notification_log;
pub mod plates;
pub mod queue;
pub mod registrations;
