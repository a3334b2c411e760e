//! Automatic suspension and reactivation of customer connections.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{ConnectionStatus, Customer, TenantSettings};
use crate::services::metrics::{record_connection_change, record_error};
use crate::services::BillingStore;

/// What the policy wants done with one customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionDecision {
    Suspend,
    Reactivate,
    Keep,
}

/// Decide a customer's automatic status change.
///
/// `auto_suspend_days <= 0` disables automation entirely. An active customer
/// is suspended once their earliest unpaid bill is at least
/// `auto_suspend_days` past its due date. A suspended customer with nothing
/// due is reactivated. Pending customers are only changed by staff.
pub fn decide(
    status: ConnectionStatus,
    due_balance: Decimal,
    earliest_unpaid_due_date: Option<NaiveDate>,
    auto_suspend_days: i32,
    today: NaiveDate,
) -> SuspensionDecision {
    if auto_suspend_days <= 0 {
        return SuspensionDecision::Keep;
    }

    match status {
        ConnectionStatus::Active => match earliest_unpaid_due_date {
            Some(due_date) if (today - due_date).num_days() >= i64::from(auto_suspend_days) => {
                SuspensionDecision::Suspend
            }
            _ => SuspensionDecision::Keep,
        },
        ConnectionStatus::Suspended if due_balance <= Decimal::ZERO => {
            SuspensionDecision::Reactivate
        }
        _ => SuspensionDecision::Keep,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepError {
    pub customer_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuspensionReport {
    pub tenant_id: Uuid,
    pub run_date: NaiveDate,
    pub auto_suspend_days: i32,
    pub evaluated: u32,
    pub suspended: u32,
    pub reactivated: u32,
    pub errors: Vec<SweepError>,
}

/// Apply the policy to every active and suspended customer of a tenant.
///
/// A failure on one customer is recorded in the report and the sweep moves on.
#[instrument(skip(store), fields(tenant_id = %tenant_id, today = %today))]
pub async fn run_suspension_sweep(
    store: &dyn BillingStore,
    tenant_id: Uuid,
    today: NaiveDate,
) -> Result<SuspensionReport, AppError> {
    let settings = store.get_tenant_settings(tenant_id).await?;
    let mut report = SuspensionReport {
        tenant_id,
        run_date: today,
        auto_suspend_days: settings.auto_suspend_days,
        evaluated: 0,
        suspended: 0,
        reactivated: 0,
        errors: Vec::new(),
    };

    if !settings.auto_suspend_enabled() {
        tracing::debug!("Auto-suspend disabled for tenant");
        return Ok(report);
    }

    let tenant_label = tenant_id.to_string();
    for candidate in store.list_suspension_candidates(tenant_id).await? {
        report.evaluated += 1;

        let decision = decide(
            ConnectionStatus::from_string(&candidate.connection_status),
            candidate.due_balance,
            candidate.earliest_unpaid_due_date,
            settings.auto_suspend_days,
            today,
        );
        let target = match decision {
            SuspensionDecision::Suspend => ConnectionStatus::Suspended,
            SuspensionDecision::Reactivate => ConnectionStatus::Active,
            SuspensionDecision::Keep => continue,
        };

        match store
            .update_customer_status(tenant_id, candidate.customer_id, target)
            .await
        {
            Ok(Some(_)) => {
                if decision == SuspensionDecision::Suspend {
                    report.suspended += 1;
                    record_connection_change(&tenant_label, "suspended");
                } else {
                    report.reactivated += 1;
                    record_connection_change(&tenant_label, "reactivated");
                }
                info!(
                    customer_id = %candidate.customer_id,
                    status = %target.as_str(),
                    earliest_unpaid_due_date = ?candidate.earliest_unpaid_due_date,
                    "Connection status changed automatically"
                );
            }
            Ok(None) => report.errors.push(SweepError {
                customer_id: candidate.customer_id,
                message: "customer disappeared during sweep".to_string(),
            }),
            Err(e) => {
                warn!(customer_id = %candidate.customer_id, error = %e, "Failed to update connection status");
                record_error("status_update", "suspension_sweep");
                report.errors.push(SweepError {
                    customer_id: candidate.customer_id,
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        evaluated = report.evaluated,
        suspended = report.suspended,
        reactivated = report.reactivated,
        errors = report.errors.len(),
        "Suspension sweep completed"
    );

    Ok(report)
}

/// Reactivate a suspended customer whose balance was just cleared.
/// Returns the (possibly updated) customer and whether it was reactivated.
pub async fn reactivate_if_cleared(
    store: &dyn BillingStore,
    settings: &TenantSettings,
    customer: Customer,
    today: NaiveDate,
) -> Result<(Customer, bool), AppError> {
    let decision = decide(
        customer.status(),
        customer.due_balance,
        None,
        settings.auto_suspend_days,
        today,
    );
    if decision != SuspensionDecision::Reactivate {
        return Ok((customer, false));
    }

    let updated = store
        .update_customer_status(customer.tenant_id, customer.customer_id, ConnectionStatus::Active)
        .await?
        .unwrap_or(customer);

    record_connection_change(&updated.tenant_id.to_string(), "reactivated");
    info!(customer_id = %updated.customer_id, "Customer reactivated after payment");

    Ok((updated, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn suspends_exactly_at_threshold() {
        let due = Some(day(1));
        assert_eq!(
            decide(ConnectionStatus::Active, Decimal::from(500), due, 7, day(7)),
            SuspensionDecision::Keep
        );
        assert_eq!(
            decide(ConnectionStatus::Active, Decimal::from(500), due, 7, day(8)),
            SuspensionDecision::Suspend
        );
    }

    #[test]
    fn zero_threshold_disables_automation() {
        assert_eq!(
            decide(ConnectionStatus::Active, Decimal::from(500), Some(day(1)), 0, day(30)),
            SuspensionDecision::Keep
        );
        assert_eq!(
            decide(ConnectionStatus::Suspended, Decimal::ZERO, None, 0, day(30)),
            SuspensionDecision::Keep
        );
    }

    #[test]
    fn reactivates_suspended_customer_with_nothing_due() {
        assert_eq!(
            decide(ConnectionStatus::Suspended, Decimal::ZERO, None, 5, day(10)),
            SuspensionDecision::Reactivate
        );
        assert_eq!(
            decide(ConnectionStatus::Suspended, Decimal::from(1), None, 5, day(10)),
            SuspensionDecision::Keep
        );
    }

    #[test]
    fn pending_customers_are_left_alone() {
        assert_eq!(
            decide(ConnectionStatus::Pending, Decimal::from(900), Some(day(1)), 1, day(30)),
            SuspensionDecision::Keep
        );
    }

    #[test]
    fn active_customer_without_unpaid_bills_stays_active() {
        assert_eq!(
            decide(ConnectionStatus::Active, Decimal::ZERO, None, 3, day(30)),
            SuspensionDecision::Keep
        );
    }
}
