//! HTTP handlers for the billing API.
//!
//! All operations are scoped to the tenant from the request context.

pub mod bills;
pub mod customers;
pub mod jobs;
pub mod notifications;
pub mod packages;
pub mod payments;
pub mod reports;
pub mod settings;

use chrono::{NaiveDate, Utc};

/// Business date for requests that do not carry one.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
