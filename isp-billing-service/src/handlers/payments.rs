use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use super::today;
use crate::billing::record_payment as run_allocator;
use crate::middleware::TenantContext;
use crate::models::{ListPaymentsFilter, Payment, PaymentOutcome, RecordPayment};
use crate::startup::AppState;

/// Record a payment. The acting user from the request context is stored as
/// `recorded_by`.
pub async fn record_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(mut payload): Json<RecordPayment>,
) -> Result<(StatusCode, Json<PaymentOutcome>), AppError> {
    payload.recorded_by = tenant.user_id.clone();

    tracing::info!(
        tenant_id = %tenant.tenant_id,
        customer_id = %payload.customer_id,
        bill_id = ?payload.bill_id,
        amount = %payload.amount,
        method = %payload.method.as_str(),
        "Recording payment"
    );

    let outcome = run_allocator(state.store.as_ref(), tenant.tenant_id, &payload, today()).await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(filter): Query<ListPaymentsFilter>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state
        .store
        .list_payments(tenant.tenant_id, &filter)
        .await?;
    Ok(Json(payments))
}
