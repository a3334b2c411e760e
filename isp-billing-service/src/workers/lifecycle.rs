//! Periodic driver for the daily billing lifecycle jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::billing::{run_billing_reminders, run_overdue_sweep, run_suspension_sweep};
use crate::config::JobsConfig;
use crate::services::metrics::record_job_run;
use crate::services::push::PushSender;
use crate::services::BillingStore;

/// Totals of one pass over every tenant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LifecycleRunSummary {
    pub tenants: u32,
    pub bills_marked_overdue: u64,
    pub customers_suspended: u32,
    pub customers_reactivated: u32,
    pub reminders_sent: u32,
    pub reminders_skipped: u32,
    pub failures: u32,
}

/// Runs overdue sweep, suspension sweep and reminders for every tenant on a
/// fixed interval until cancelled.
pub struct LifecycleJobRunner {
    config: JobsConfig,
    store: Arc<dyn BillingStore>,
    push: Arc<dyn PushSender>,
    push_max_elapsed: Duration,
    shutdown_token: CancellationToken,
}

impl LifecycleJobRunner {
    pub fn new(
        config: JobsConfig,
        store: Arc<dyn BillingStore>,
        push: Arc<dyn PushSender>,
        push_max_elapsed: Duration,
    ) -> Self {
        Self {
            config,
            store,
            push,
            push_max_elapsed,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops the runner when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Spawn the periodic loop. Does nothing when disabled by configuration.
    pub fn start(self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.enabled {
            tracing::info!("Lifecycle job runner disabled by configuration");
            return None;
        }

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting lifecycle job runner"
        );

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = self.shutdown_token.cancelled() => {
                        tracing::info!("Lifecycle job runner shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let summary = self.run_once(Utc::now().date_naive()).await;
                        tracing::info!(
                            tenants = summary.tenants,
                            bills_marked_overdue = summary.bills_marked_overdue,
                            customers_suspended = summary.customers_suspended,
                            customers_reactivated = summary.customers_reactivated,
                            reminders_sent = summary.reminders_sent,
                            failures = summary.failures,
                            "Lifecycle run completed"
                        );
                    }
                }
            }
        }))
    }

    /// One pass over every tenant for `today`. Failures are logged and counted,
    /// never propagated.
    pub async fn run_once(&self, today: NaiveDate) -> LifecycleRunSummary {
        let mut summary = LifecycleRunSummary::default();

        let tenants = match self.store.list_tenant_ids().await {
            Ok(tenants) => tenants,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list tenants for lifecycle run");
                record_job_run("lifecycle", "failed");
                summary.failures += 1;
                return summary;
            }
        };

        for tenant_id in tenants {
            if self.shutdown_token.is_cancelled() {
                break;
            }
            summary.tenants += 1;
            self.run_tenant(tenant_id, today, &mut summary).await;
        }

        record_job_run(
            "lifecycle",
            if summary.failures == 0 { "success" } else { "partial" },
        );
        summary
    }

    async fn run_tenant(&self, tenant_id: Uuid, today: NaiveDate, summary: &mut LifecycleRunSummary) {
        let store = self.store.as_ref();

        match run_overdue_sweep(store, tenant_id, today).await {
            Ok(report) => summary.bills_marked_overdue += report.bills_marked,
            Err(e) => {
                tracing::error!(tenant_id = %tenant_id, error = %e, "Overdue sweep failed");
                summary.failures += 1;
            }
        }

        match run_suspension_sweep(store, tenant_id, today).await {
            Ok(report) => {
                summary.customers_suspended += report.suspended;
                summary.customers_reactivated += report.reactivated;
                summary.failures += report.errors.len() as u32;
            }
            Err(e) => {
                tracing::error!(tenant_id = %tenant_id, error = %e, "Suspension sweep failed");
                summary.failures += 1;
            }
        }

        let reminders = run_billing_reminders(
            store,
            self.push.as_ref(),
            self.push_max_elapsed,
            tenant_id,
            today,
        )
        .await;
        summary.reminders_sent += reminders.total_sent;
        summary.reminders_skipped += reminders.total_skipped;
        summary.failures += reminders.total_errors;
    }
}
