//! Triggers for the daily lifecycle jobs, for an external scheduler.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::NaiveDate;
use service_core::error::AppError;

use super::today;
use crate::billing::{
    run_billing_reminders, run_overdue_sweep, run_suspension_sweep, OverdueReport,
    ReminderReport, SuspensionReport,
};
use crate::dtos::RunJobRequest;
use crate::middleware::TenantContext;
use crate::services::metrics::record_job_run;
use crate::startup::AppState;

/// Replay date from the request body. No JSON body means today; a body that
/// does not parse is a 400.
fn run_date(body: Result<Json<RunJobRequest>, JsonRejection>) -> Result<NaiveDate, AppError> {
    match body {
        Ok(Json(req)) => Ok(req.today.unwrap_or_else(today)),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(today()),
        Err(rejection) => Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid job request: {}",
            rejection.body_text()
        ))),
    }
}

pub async fn run_overdue(
    State(state): State<AppState>,
    tenant: TenantContext,
    body: Result<Json<RunJobRequest>, JsonRejection>,
) -> Result<Json<OverdueReport>, AppError> {
    let report = run_overdue_sweep(state.store.as_ref(), tenant.tenant_id, run_date(body)?).await?;
    record_job_run("overdue_sweep", "success");
    Ok(Json(report))
}

pub async fn run_suspension(
    State(state): State<AppState>,
    tenant: TenantContext,
    body: Result<Json<RunJobRequest>, JsonRejection>,
) -> Result<Json<SuspensionReport>, AppError> {
    let today = run_date(body)?;
    let report = run_suspension_sweep(state.store.as_ref(), tenant.tenant_id, today).await?;
    record_job_run("suspension_sweep", "success");
    Ok(Json(report))
}

/// Send today's reminders. Succeeds even when individual bills failed; the
/// failures are listed in the report.
pub async fn run_reminders(
    State(state): State<AppState>,
    tenant: TenantContext,
    body: Result<Json<RunJobRequest>, JsonRejection>,
) -> Result<Json<ReminderReport>, AppError> {
    let today = run_date(body)?;
    let report = run_billing_reminders(
        state.store.as_ref(),
        state.push.as_ref(),
        state.config.push.max_elapsed,
        tenant.tenant_id,
        today,
    )
    .await;
    record_job_run(
        "billing_reminders",
        if report.total_errors == 0 { "success" } else { "partial" },
    );
    Ok(Json(report))
}
