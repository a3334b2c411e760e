//! Due-date reminders.
//!
//! For each lead time, bills falling due exactly that many days from today get
//! one reminder per customer per day. The dedup check is the store's atomic
//! insert-if-absent, so concurrent or repeated runs on the same day never
//! produce a second entry.

use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use service_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{Bill, NewNotification, NotificationStatus, BILLING_REMINDER};
use crate::services::metrics::record_reminder;
use crate::services::push::{send_with_retry, PushMessage, PushSender};
use crate::services::BillingStore;

/// Days before the due date at which reminders go out, in processing order.
pub const LEAD_TIMES: [u32; 3] = [1, 3, 7];

/// Bills processed concurrently within one lead time.
const BILL_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct ReminderError {
    pub bill_id: Uuid,
    pub customer_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadTimeReport {
    pub lead_time: u32,
    pub target_date: NaiveDate,
    /// Reminders logged on this run.
    pub sent: u32,
    /// Bills whose customer already had a reminder today.
    pub skipped: u32,
    pub errors: Vec<ReminderError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReminderReport {
    pub tenant_id: Uuid,
    pub run_date: NaiveDate,
    pub lead_times: Vec<LeadTimeReport>,
    pub total_sent: u32,
    pub total_skipped: u32,
    pub total_errors: u32,
    pub processed_utc: DateTime<Utc>,
}

enum Outcome {
    Logged(NotificationStatus),
    Skipped,
}

/// Title and body for a reminder, most urgent for the shortest lead time.
pub fn compose_message(lead_time: u32, bill: &Bill, currency: &str) -> (String, String) {
    let amount = format!("{} {}", currency, bill.amount);
    match lead_time {
        1 => (
            "Payment due tomorrow".to_string(),
            format!(
                "Urgent: bill {} for {} is due tomorrow ({}). Please pay now to avoid service interruption.",
                bill.invoice_number, amount, bill.due_date
            ),
        ),
        2..=3 => (
            format!("Payment due in {} days", lead_time),
            format!(
                "Reminder: bill {} for {} is due on {}.",
                bill.invoice_number, amount, bill.due_date
            ),
        ),
        _ => (
            "Upcoming bill".to_string(),
            format!(
                "Your bill {} for {} is due on {}, {} days from now.",
                bill.invoice_number, amount, bill.due_date, lead_time
            ),
        ),
    }
}

fn reminder_payload(bill: &Bill, lead_time: u32) -> serde_json::Value {
    serde_json::json!({
        "bill_id": bill.bill_id,
        "invoice_number": bill.invoice_number,
        "amount": bill.amount.to_string(),
        "due_date": bill.due_date,
        "billing_period_start": bill.billing_period_start,
        "billing_period_end": bill.billing_period_end,
        "status": bill.status,
        "days_before_due": lead_time,
    })
}

/// Send today's reminders for one tenant.
///
/// Never fails as a whole: query and per-bill failures are collected in the
/// report and the run continues with the next bill and lead time.
#[instrument(skip(store, push), fields(tenant_id = %tenant_id, today = %today))]
pub async fn run_billing_reminders(
    store: &dyn BillingStore,
    push: &dyn PushSender,
    push_max_elapsed: Duration,
    tenant_id: Uuid,
    today: NaiveDate,
) -> ReminderReport {
    let currency = match store.get_tenant_settings(tenant_id).await {
        Ok(settings) => settings.currency,
        Err(e) => {
            warn!(error = %e, "Failed to load tenant settings, using default currency");
            crate::models::DEFAULT_CURRENCY.to_string()
        }
    };

    let mut lead_times = Vec::with_capacity(LEAD_TIMES.len());
    for lead_time in LEAD_TIMES {
        let target_date = today
            .checked_add_days(Days::new(u64::from(lead_time)))
            .unwrap_or(today);
        let mut lead_report = LeadTimeReport {
            lead_time,
            target_date,
            sent: 0,
            skipped: 0,
            errors: Vec::new(),
        };

        let bills = match store.find_unpaid_bills_due_on(tenant_id, target_date).await {
            Ok(bills) => bills,
            Err(e) => {
                warn!(lead_time, error = %e, "Failed to query bills for reminders");
                lead_report.errors.push(ReminderError {
                    bill_id: Uuid::nil(),
                    customer_id: Uuid::nil(),
                    message: e.to_string(),
                });
                lead_times.push(lead_report);
                continue;
            }
        };

        let outcomes: Vec<(Bill, Result<Outcome, AppError>)> = stream::iter(bills)
            .map(|bill| {
                let currency = currency.as_str();
                async move {
                    let outcome = remind(
                        store,
                        push,
                        push_max_elapsed,
                        tenant_id,
                        &bill,
                        lead_time,
                        currency,
                        today,
                    )
                    .await;
                    (bill, outcome)
                }
            })
            .buffer_unordered(BILL_CONCURRENCY)
            .collect()
            .await;

        let tenant_label = tenant_id.to_string();
        for (bill, outcome) in outcomes {
            match outcome {
                Ok(Outcome::Logged(status)) => {
                    lead_report.sent += 1;
                    record_reminder(&tenant_label, lead_time, status.as_str());
                }
                Ok(Outcome::Skipped) => {
                    lead_report.skipped += 1;
                    record_reminder(&tenant_label, lead_time, "skipped");
                }
                Err(e) => {
                    warn!(bill_id = %bill.bill_id, error = %e, "Reminder failed");
                    record_reminder(&tenant_label, lead_time, "error");
                    lead_report.errors.push(ReminderError {
                        bill_id: bill.bill_id,
                        customer_id: bill.customer_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        lead_times.push(lead_report);
    }

    let report = ReminderReport {
        tenant_id,
        run_date: today,
        total_sent: lead_times.iter().map(|l| l.sent).sum(),
        total_skipped: lead_times.iter().map(|l| l.skipped).sum(),
        total_errors: lead_times.iter().map(|l| l.errors.len() as u32).sum(),
        lead_times,
        processed_utc: Utc::now(),
    };

    info!(
        sent = report.total_sent,
        skipped = report.total_skipped,
        errors = report.total_errors,
        "Billing reminders processed"
    );

    report
}

#[allow(clippy::too_many_arguments)]
async fn remind(
    store: &dyn BillingStore,
    push: &dyn PushSender,
    push_max_elapsed: Duration,
    tenant_id: Uuid,
    bill: &Bill,
    lead_time: u32,
    currency: &str,
    today: NaiveDate,
) -> Result<Outcome, AppError> {
    let (title, body) = compose_message(lead_time, bill, currency);
    let data = reminder_payload(bill, lead_time);

    let notification = NewNotification {
        customer_id: bill.customer_id,
        notification_type: BILLING_REMINDER.to_string(),
        title: title.clone(),
        body: body.clone(),
        data: data.clone(),
        dedup_day: today,
    };

    let Some(log) = store
        .insert_notification_if_absent(tenant_id, &notification)
        .await?
    else {
        return Ok(Outcome::Skipped);
    };

    let subscriptions = store
        .list_active_push_subscriptions(tenant_id, bill.customer_id)
        .await?;
    if subscriptions.is_empty() || !push.is_enabled() {
        return Ok(Outcome::Logged(NotificationStatus::Pending));
    }

    let message = PushMessage { title, body, data };
    let mut delivered = 0usize;
    for subscription in &subscriptions {
        match send_with_retry(push, subscription, &message, push_max_elapsed).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(
                subscription_id = %subscription.subscription_id,
                customer_id = %bill.customer_id,
                error = %e,
                "Push delivery failed"
            ),
        }
    }

    let (status, sent_utc) = if delivered > 0 {
        (NotificationStatus::Sent, Some(Utc::now()))
    } else {
        (NotificationStatus::Failed, None)
    };
    store
        .update_notification_status(tenant_id, log.notification_id, status, sent_utc)
        .await?;

    Ok(Outcome::Logged(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn bill() -> Bill {
        let due = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
        Bill {
            bill_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            amount: Decimal::from(1000),
            billing_period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            billing_period_end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            due_date: due,
            status: "due".to_string(),
            invoice_number: "INV-2024-0001".to_string(),
            notes: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn urgency_wording_depends_on_lead_time() {
        let bill = bill();
        let (title_1, body_1) = compose_message(1, &bill, "BDT");
        let (title_3, _) = compose_message(3, &bill, "BDT");
        let (title_7, body_7) = compose_message(7, &bill, "BDT");

        assert_eq!(title_1, "Payment due tomorrow");
        assert!(body_1.starts_with("Urgent:"));
        assert!(body_1.contains("BDT 1000"));
        assert_eq!(title_3, "Payment due in 3 days");
        assert_eq!(title_7, "Upcoming bill");
        assert!(body_7.contains("INV-2024-0001"));
        assert!(!body_7.contains("Urgent"));
    }

    #[test]
    fn payload_carries_bill_context() {
        let bill = bill();
        let data = reminder_payload(&bill, 3);
        assert_eq!(data["invoice_number"], "INV-2024-0001");
        assert_eq!(data["amount"], "1000");
        assert_eq!(data["due_date"], "2024-02-05");
        assert_eq!(data["days_before_due"], 3);
    }

    #[test]
    fn lead_times_are_processed_shortest_first() {
        assert_eq!(LEAD_TIMES, [1, 3, 7]);
    }
}
