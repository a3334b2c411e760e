use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::middleware::TenantContext;
use crate::models::{ListNotificationsFilter, NotificationLog};
use crate::startup::AppState;

pub async fn list_notifications(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(filter): Query<ListNotificationsFilter>,
) -> Result<Json<Vec<NotificationLog>>, AppError> {
    let notifications = state
        .store
        .list_notifications(tenant.tenant_id, &filter)
        .await?;
    Ok(Json(notifications))
}
