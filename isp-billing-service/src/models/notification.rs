//! Notification log and push subscription models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Notification type written by the reminder scheduler.
pub const BILLING_REMINDER: &str = "billing_reminder";

/// Delivery status of a logged notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => NotificationStatus::Sent,
            "failed" => NotificationStatus::Failed,
            _ => NotificationStatus::Pending,
        }
    }
}

/// A logged notification.
///
/// `dedup_day` is the calendar day the entry was created for; together with
/// tenant, customer and type it identifies at most one row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationLog {
    pub notification_id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub status: String,
    pub dedup_day: NaiveDate,
    pub created_utc: DateTime<Utc>,
    pub sent_utc: Option<DateTime<Utc>>,
}

impl NotificationLog {
    pub fn notification_status(&self) -> NotificationStatus {
        NotificationStatus::from_string(&self.status)
    }
}

/// A notification to insert if no entry exists for the same dedup key.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub customer_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub dedup_day: NaiveDate,
}

/// Filter parameters for listing notifications.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListNotificationsFilter {
    pub customer_id: Option<Uuid>,
    pub status: Option<NotificationStatus>,
    pub day: Option<NaiveDate>,
}

/// A browser push subscription registered by a customer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PushSubscription {
    pub subscription_id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub endpoint: String,
    pub p256dh: Option<String>,
    pub auth: Option<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for registering a push subscription.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePushSubscription {
    #[validate(url)]
    pub endpoint: String,
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}
