//! Prometheus metrics for the billing lifecycle.
//! Counters are labelled by tenant for per-tenant metering.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_counter_vec, register_histogram_vec,
    register_int_counter_vec, CounterVec, Encoder, HistogramVec, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "isp_billing_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Bills generated (per-tenant metering)
pub static BILLS_GENERATED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Payments recorded (per-tenant metering)
pub static PAYMENTS_RECORDED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Payment amount collected by method
pub static PAYMENT_AMOUNT_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Reminder outcomes
pub static REMINDERS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Automatic connection status changes
pub static CONNECTION_CHANGES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Bills promoted to overdue
pub static BILLS_OVERDUE_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Lifecycle job runs
pub static JOB_RUNS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Recorder behind the `metrics` facade used by the HTTP middleware.
static HTTP_METRICS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    BILLS_GENERATED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "isp_billing_bills_generated_total",
                "Total bills generated by tenant"
            ),
            &["tenant_id"]
        )
        .expect("Failed to register BILLS_GENERATED_TOTAL")
    });

    PAYMENTS_RECORDED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "isp_billing_payments_recorded_total",
                "Total payments recorded by tenant and method"
            ),
            &["tenant_id", "method"]
        )
        .expect("Failed to register PAYMENTS_RECORDED_TOTAL")
    });

    PAYMENT_AMOUNT_TOTAL.get_or_init(|| {
        register_counter_vec!(
            opts!(
                "isp_billing_payment_amount_total",
                "Total amount collected by tenant and method"
            ),
            &["tenant_id", "method"]
        )
        .expect("Failed to register PAYMENT_AMOUNT_TOTAL")
    });

    REMINDERS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "isp_billing_reminders_total",
                "Billing reminders by tenant, lead time and outcome"
            ),
            &["tenant_id", "lead_days", "outcome"]
        )
        .expect("Failed to register REMINDERS_TOTAL")
    });

    CONNECTION_CHANGES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "isp_billing_connection_changes_total",
                "Automatic suspensions and reactivations by tenant"
            ),
            &["tenant_id", "change"]
        )
        .expect("Failed to register CONNECTION_CHANGES_TOTAL")
    });

    BILLS_OVERDUE_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "isp_billing_bills_overdue_total",
                "Bills promoted to overdue by tenant"
            ),
            &["tenant_id"]
        )
        .expect("Failed to register BILLS_OVERDUE_TOTAL")
    });

    JOB_RUNS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("isp_billing_job_runs_total", "Lifecycle job runs"),
            &["job", "status"]
        )
        .expect("Failed to register JOB_RUNS_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("isp_billing_errors_total", "Total errors by type for alerting"),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    HTTP_METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install HTTP metrics recorder");
            None
        }
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    let mut text = String::from_utf8(buffer).unwrap_or_default();
    if let Some(handle) = HTTP_METRICS_HANDLE.get().and_then(Option::as_ref) {
        text.push_str(&handle.render());
    }
    text
}

pub fn record_bills_generated(tenant_id: &str, count: usize) {
    if let Some(counter) = BILLS_GENERATED_TOTAL.get() {
        counter.with_label_values(&[tenant_id]).inc_by(count as u64);
    }
}

/// Record a payment and its amount.
pub fn record_payment(tenant_id: &str, method: &str, amount: f64) {
    if let Some(counter) = PAYMENTS_RECORDED_TOTAL.get() {
        counter.with_label_values(&[tenant_id, method]).inc();
    }
    if let Some(counter) = PAYMENT_AMOUNT_TOTAL.get() {
        counter
            .with_label_values(&[tenant_id, method])
            .inc_by(amount.abs());
    }
}

/// Record one reminder outcome (`sent`, `failed`, `pending`, `skipped`, `error`).
pub fn record_reminder(tenant_id: &str, lead_days: u32, outcome: &str) {
    if let Some(counter) = REMINDERS_TOTAL.get() {
        counter
            .with_label_values(&[tenant_id, &lead_days.to_string(), outcome])
            .inc();
    }
}

pub fn record_connection_change(tenant_id: &str, change: &str) {
    if let Some(counter) = CONNECTION_CHANGES_TOTAL.get() {
        counter.with_label_values(&[tenant_id, change]).inc();
    }
}

pub fn record_bills_overdue(tenant_id: &str, count: u64) {
    if let Some(counter) = BILLS_OVERDUE_TOTAL.get() {
        counter.with_label_values(&[tenant_id]).inc_by(count);
    }
}

pub fn record_job_run(job: &str, status: &str) {
    if let Some(counter) = JOB_RUNS_TOTAL.get() {
        counter.with_label_values(&[job, status]).inc();
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}
