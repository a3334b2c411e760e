//! Monthly bill generation.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

use super::BillingError;
use crate::models::{Bill, BillDraft, GenerateBills, NewBillBatch};
use crate::services::metrics::record_bills_generated;
use crate::services::BillingStore;

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub bill_count: usize,
    pub total_amount: Decimal,
    pub bills: Vec<Bill>,
}

/// Create one `due` bill for every active customer with a package.
///
/// Each bill charges the package's monthly price. Invoice numbers are drawn
/// from the tenant's sequence for the year of `today`. Fails with
/// [`BillingError::NoEligibleCustomers`] and writes nothing when no customer
/// qualifies.
#[instrument(skip(store, input), fields(tenant_id = %tenant_id, period_start = %input.billing_period_start))]
pub async fn generate_bills(
    store: &dyn BillingStore,
    tenant_id: Uuid,
    input: &GenerateBills,
    today: NaiveDate,
) -> Result<GenerationResult, AppError> {
    if input.billing_period_end < input.billing_period_start {
        return Err(BillingError::InvalidPeriod(format!(
            "period end {} is before period start {}",
            input.billing_period_end, input.billing_period_start
        ))
        .into());
    }

    let customers = store.find_billable_customers(tenant_id).await?;
    if customers.is_empty() {
        return Err(BillingError::NoEligibleCustomers.into());
    }

    let batch = NewBillBatch {
        invoice_year: today.year(),
        billing_period_start: input.billing_period_start,
        billing_period_end: input.billing_period_end,
        due_date: input.due_date,
        notes: input.notes.clone(),
        drafts: customers
            .iter()
            .map(|c| BillDraft {
                customer_id: c.customer_id,
                amount: c.monthly_price,
            })
            .collect(),
    };

    let bills = store.insert_bill_batch(tenant_id, &batch).await?;
    let total_amount: Decimal = bills.iter().map(|b| b.amount).sum();

    record_bills_generated(&tenant_id.to_string(), bills.len());
    info!(
        bill_count = bills.len(),
        total_amount = %total_amount,
        due_date = %input.due_date,
        "Bills generated"
    );

    Ok(GenerationResult {
        bill_count: bills.len(),
        total_amount,
        bills,
    })
}
