//! Payment recording and bill settlement.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

use super::suspension::reactivate_if_cleared;
use super::BillingError;
use crate::models::{PaymentOutcome, RecordPayment};
use crate::services::metrics::record_payment as record_payment_metric;
use crate::services::BillingStore;

/// Record a payment, settle the referenced bill and reactivate the customer
/// if the payment cleared everything they owed.
#[instrument(skip(store, input), fields(tenant_id = %tenant_id, customer_id = %input.customer_id, amount = %input.amount))]
pub async fn record_payment(
    store: &dyn BillingStore,
    tenant_id: Uuid,
    input: &RecordPayment,
    today: NaiveDate,
) -> Result<PaymentOutcome, AppError> {
    if input.amount <= Decimal::ZERO {
        return Err(BillingError::NonPositiveAmount(input.amount).into());
    }

    let applied = store.apply_payment(tenant_id, input, today).await?;

    let settings = store.get_tenant_settings(tenant_id).await?;
    let (customer, reactivated) =
        reactivate_if_cleared(store, &settings, applied.customer, today).await?;

    record_payment_metric(
        &tenant_id.to_string(),
        input.method.as_str(),
        input.amount.to_f64().unwrap_or_default(),
    );
    info!(
        payment_id = %applied.payment.payment_id,
        bill_status = applied.bill.as_ref().map(|b| b.status.as_str()).unwrap_or("none"),
        reactivated,
        "Payment recorded"
    );

    Ok(PaymentOutcome {
        payment: applied.payment,
        bill: applied.bill,
        customer,
        reactivated,
    })
}
