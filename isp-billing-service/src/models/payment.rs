//! Payment model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{Bill, Customer};

/// How a payment was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Online,
    BankTransfer,
    Bkash,
    Nagad,
    Rocket,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Online => "online",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Bkash => "bkash",
            PaymentMethod::Nagad => "nagad",
            PaymentMethod::Rocket => "rocket",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "online" => PaymentMethod::Online,
            "bank_transfer" => PaymentMethod::BankTransfer,
            "bkash" => PaymentMethod::Bkash,
            "nagad" => PaymentMethod::Nagad,
            "rocket" => PaymentMethod::Rocket,
            _ => PaymentMethod::Cash,
        }
    }
}

/// Payment. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub bill_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: String,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPayment {
    pub customer_id: Uuid,
    pub bill_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub recorded_by: String,
}

/// Result of the atomic payment write.
#[derive(Debug, Clone)]
pub struct AppliedPayment {
    pub payment: Payment,
    /// The referenced bill after its status was recomputed.
    pub bill: Option<Bill>,
    /// The payer with refreshed balances and last payment date.
    pub customer: Customer,
}

/// Everything a caller learns from recording a payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub bill: Option<Bill>,
    pub customer: Customer,
    pub reactivated: bool,
}

/// Filter parameters for listing payments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPaymentsFilter {
    pub customer_id: Option<Uuid>,
    pub bill_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_labels_round_trip_through_storage_strings() {
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::Online,
            PaymentMethod::BankTransfer,
            PaymentMethod::Bkash,
        ] {
            assert_eq!(PaymentMethod::from_string(method.as_str()), method);
        }
    }
}
