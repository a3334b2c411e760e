use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use super::today;
use crate::billing::{generate_bills as run_generator, GenerationResult};
use crate::dtos::Page;
use crate::middleware::TenantContext;
use crate::models::{effective_page_size, Bill, GenerateBills, ListBillsFilter};
use crate::startup::AppState;

/// Bill every active customer with a package for the given period.
pub async fn generate_bills(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<GenerateBills>,
) -> Result<(StatusCode, Json<GenerationResult>), AppError> {
    tracing::info!(
        tenant_id = %tenant.tenant_id,
        user_id = %tenant.user_id,
        period_start = %payload.billing_period_start,
        period_end = %payload.billing_period_end,
        "Generating bills"
    );

    let issue_date = payload.issue_date.unwrap_or_else(today);
    let result =
        run_generator(state.store.as_ref(), tenant.tenant_id, &payload, issue_date).await?;

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn get_bill(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(bill_id): Path<Uuid>,
) -> Result<Json<Bill>, AppError> {
    let bill = state
        .store
        .get_bill(tenant.tenant_id, bill_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Bill not found")))?;

    Ok(Json(bill))
}

pub async fn list_bills(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(filter): Query<ListBillsFilter>,
) -> Result<Json<Page<Bill>>, AppError> {
    let bills = state.store.list_bills(tenant.tenant_id, &filter).await?;

    Ok(Json(Page::new(
        bills,
        effective_page_size(filter.page_size),
        |b| b.bill_id,
    )))
}
