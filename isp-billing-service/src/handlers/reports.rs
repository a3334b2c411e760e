use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::billing::reports;
use crate::middleware::TenantContext;
use super::today;
use crate::models::{
    CollectionRange, CollectionSummary, DueSummary, PackageDistribution, RevenueQuery,
    RevenueReport,
};
use crate::startup::AppState;

pub async fn due_summary(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<DueSummary>, AppError> {
    let summary = reports::due_summary(state.store.as_ref(), tenant.tenant_id).await?;
    Ok(Json(summary))
}

pub async fn collection_summary(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(range): Query<CollectionRange>,
) -> Result<Json<CollectionSummary>, AppError> {
    let summary =
        reports::collection_summary(state.store.as_ref(), tenant.tenant_id, &range).await?;
    Ok(Json(summary))
}

pub async fn revenue(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<RevenueReport>, AppError> {
    let report =
        reports::revenue_report(state.store.as_ref(), tenant.tenant_id, &query, today()).await?;
    Ok(Json(report))
}

pub async fn package_distribution(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<PackageDistribution>, AppError> {
    let distribution = reports::package_distribution(state.store.as_ref(), tenant.tenant_id).await?;
    Ok(Json(distribution))
}
