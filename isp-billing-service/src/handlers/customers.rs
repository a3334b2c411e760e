use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::today;
use crate::dtos::{DeactivatedResponse, Page, SetCustomerStatusRequest};
use crate::middleware::TenantContext;
use crate::models::{
    effective_page_size, CreateCustomer, CreatePushSubscription, Customer, ListCustomersFilter,
    PushSubscription,
};
use crate::startup::AppState;

/// Create a customer. New customers start as `pending` until staff activate them.
pub async fn create_customer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateCustomer>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    payload.validate()?;

    if let Some(package_id) = payload.package_id {
        state
            .store
            .get_package(tenant.tenant_id, package_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Package {} not found", package_id))
            })?;
    }

    let customer = state
        .store
        .create_customer(
            tenant.tenant_id,
            &payload,
            payload.join_date.unwrap_or_else(today),
        )
        .await?;

    tracing::info!(
        customer_id = %customer.customer_id,
        tenant_id = %tenant.tenant_id,
        user_id = %tenant.user_id,
        "Customer created"
    );

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    let customer = state
        .store
        .get_customer(tenant.tenant_id, customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(customer))
}

pub async fn list_customers(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(filter): Query<ListCustomersFilter>,
) -> Result<Json<Page<Customer>>, AppError> {
    let customers = state
        .store
        .list_customers(tenant.tenant_id, &filter)
        .await?;

    Ok(Json(Page::new(
        customers,
        effective_page_size(filter.page_size),
        |c| c.customer_id,
    )))
}

/// Manual connection status change by staff. Any status may move to any other.
pub async fn set_customer_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<SetCustomerStatusRequest>,
) -> Result<Json<Customer>, AppError> {
    tracing::info!(
        customer_id = %customer_id,
        tenant_id = %tenant.tenant_id,
        user_id = %tenant.user_id,
        new_status = %payload.status.as_str(),
        "Setting connection status"
    );

    let customer = state
        .store
        .update_customer_status(tenant.tenant_id, customer_id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(customer))
}

/// Recompute the customer's due and advance balances from the ledger.
pub async fn refresh_balances(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    state
        .store
        .recompute_customer_balances(tenant.tenant_id, &[customer_id])
        .await?;

    let customer = state
        .store
        .get_customer(tenant.tenant_id, customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(customer))
}

pub async fn register_push_subscription(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<CreatePushSubscription>,
) -> Result<(StatusCode, Json<PushSubscription>), AppError> {
    payload.validate()?;

    state
        .store
        .get_customer(tenant.tenant_id, customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    let subscription = state
        .store
        .create_push_subscription(tenant.tenant_id, customer_id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn deactivate_push_subscription(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<DeactivatedResponse>, AppError> {
    let found = state
        .store
        .deactivate_push_subscription(tenant.tenant_id, subscription_id)
        .await?;
    if !found {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Push subscription not found"
        )));
    }

    Ok(Json(DeactivatedResponse {
        subscription_id,
        is_active: false,
    }))
}
