//! Promotion of past-due bills to `overdue`.

use chrono::NaiveDate;
use serde::Serialize;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::services::metrics::record_bills_overdue;
use crate::services::BillingStore;

#[derive(Debug, Clone, Serialize)]
pub struct OverdueReport {
    pub tenant_id: Uuid,
    pub run_date: NaiveDate,
    pub bills_marked: u64,
}

/// Mark `due` and `partial` bills whose due date is before `today` as overdue.
#[instrument(skip(store), fields(tenant_id = %tenant_id, today = %today))]
pub async fn run_overdue_sweep(
    store: &dyn BillingStore,
    tenant_id: Uuid,
    today: NaiveDate,
) -> Result<OverdueReport, AppError> {
    let bills_marked = store.mark_overdue_bills(tenant_id, today).await?;

    if bills_marked > 0 {
        record_bills_overdue(&tenant_id.to_string(), bills_marked);
    }
    info!(bills_marked, "Overdue sweep completed");

    Ok(OverdueReport {
        tenant_id,
        run_date: today,
        bills_marked,
    })
}
