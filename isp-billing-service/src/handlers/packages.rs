use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::TenantContext;
use crate::models::{CreatePackage, ListPackagesFilter, Package};
use crate::startup::AppState;

pub async fn create_package(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreatePackage>,
) -> Result<(StatusCode, Json<Package>), AppError> {
    payload.validate()?;
    if payload.monthly_price < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "monthly_price must not be negative"
        )));
    }

    let package = state
        .store
        .create_package(tenant.tenant_id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(package)))
}

pub async fn get_package(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(package_id): Path<Uuid>,
) -> Result<Json<Package>, AppError> {
    let package = state
        .store
        .get_package(tenant.tenant_id, package_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Package not found")))?;

    Ok(Json(package))
}

pub async fn list_packages(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(filter): Query<ListPackagesFilter>,
) -> Result<Json<Vec<Package>>, AppError> {
    let packages = state
        .store
        .list_packages(tenant.tenant_id, &filter)
        .await?;
    Ok(Json(packages))
}
