use axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::middleware::TenantContext;
use crate::models::{TenantSettings, UpdateTenantSettings};
use crate::startup::AppState;

pub async fn get_settings(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<TenantSettings>, AppError> {
    let settings = state.store.get_tenant_settings(tenant.tenant_id).await?;
    Ok(Json(settings))
}

/// Patch the tenant's billing settings. Absent fields keep their value.
pub async fn update_settings(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<UpdateTenantSettings>,
) -> Result<Json<TenantSettings>, AppError> {
    payload.validate()?;

    tracing::info!(
        tenant_id = %tenant.tenant_id,
        user_id = %tenant.user_id,
        auto_suspend_days = ?payload.auto_suspend_days,
        "Updating tenant settings"
    );

    let current = state.store.get_tenant_settings(tenant.tenant_id).await?;
    let saved = state
        .store
        .upsert_tenant_settings(&payload.apply_to(current))
        .await?;

    Ok(Json(saved))
}
