//! Billing lifecycle engines.
//!
//! Each engine works against a [`BillingStore`](crate::services::BillingStore)
//! and takes the tenant id and the business date explicitly.

pub mod allocator;
pub mod generator;
pub mod overdue;
pub mod reminders;
pub mod reports;
pub mod suspension;

use service_core::error::AppError;
use thiserror::Error;

pub use allocator::record_payment;
pub use generator::{generate_bills, GenerationResult};
pub use overdue::{run_overdue_sweep, OverdueReport};
pub use reminders::{run_billing_reminders, LeadTimeReport, ReminderReport, LEAD_TIMES};
pub use suspension::{run_suspension_sweep, SuspensionDecision, SuspensionReport};

/// Domain failures of the billing lifecycle.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("No active customers with a package to bill")]
    NoEligibleCustomers,

    #[error("Invalid billing period: {0}")]
    InvalidPeriod(String),

    #[error("Payment amount must be positive, got {0}")]
    NonPositiveAmount(rust_decimal::Decimal),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NoEligibleCustomers => {
                AppError::FailedPrecondition(anyhow::anyhow!(err.to_string()))
            }
            BillingError::InvalidPeriod(_)
            | BillingError::NonPositiveAmount(_)
            | BillingError::InvalidRange(_) => AppError::BadRequest(anyhow::anyhow!(err.to_string())),
        }
    }
}
