//! Bill model and status derivation.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bill status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Due,
    Partial,
    Paid,
    Overdue,
}

/// Statuses that still expect money from the customer.
pub const UNPAID_STATUSES: [BillStatus; 3] =
    [BillStatus::Due, BillStatus::Partial, BillStatus::Overdue];

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Due => "due",
            BillStatus::Partial => "partial",
            BillStatus::Paid => "paid",
            BillStatus::Overdue => "overdue",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "partial" => BillStatus::Partial,
            "paid" => BillStatus::Paid,
            "overdue" => BillStatus::Overdue,
            _ => BillStatus::Due,
        }
    }

    pub fn is_unpaid(&self) -> bool {
        !matches!(self, BillStatus::Paid)
    }

    /// Status implied by the total paid against a bill.
    ///
    /// Depends only on the two amounts, so replaying the same payments always
    /// yields the same status. Overpayment still reads as `paid`.
    pub fn from_payments(amount: Decimal, total_paid: Decimal) -> Self {
        if total_paid >= amount {
            BillStatus::Paid
        } else if total_paid > Decimal::ZERO {
            BillStatus::Partial
        } else {
            BillStatus::Due
        }
    }
}

/// Bill.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bill {
    pub bill_id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub billing_period_start: NaiveDate,
    pub billing_period_end: NaiveDate,
    pub due_date: NaiveDate,
    pub status: String,
    pub invoice_number: String,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Bill {
    pub fn bill_status(&self) -> BillStatus {
        BillStatus::from_string(&self.status)
    }
}

/// Render a user-facing invoice number: `INV-<yyyy>-<seq>` with the sequence
/// zero-padded to at least four digits.
pub fn format_invoice_number(year: i32, sequence: i64) -> String {
    format!("INV-{:04}-{:04}", year, sequence)
}

/// Input for a bill generation run.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateBills {
    pub billing_period_start: NaiveDate,
    pub billing_period_end: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    /// Date the bills are issued on; its year scopes the invoice sequence.
    /// Defaults to the current date.
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
}

/// One bill to be written as part of a generation batch.
#[derive(Debug, Clone)]
pub struct BillDraft {
    pub customer_id: Uuid,
    pub amount: Decimal,
}

/// A batch of bills sharing a period and due date, written all-or-nothing.
#[derive(Debug, Clone)]
pub struct NewBillBatch {
    /// Year the invoice numbers are issued under.
    pub invoice_year: i32,
    pub billing_period_start: NaiveDate,
    pub billing_period_end: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub drafts: Vec<BillDraft>,
}

/// Filter parameters for listing bills.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListBillsFilter {
    pub customer_id: Option<Uuid>,
    pub status: Option<BillStatus>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_cumulative_payments() {
        let amount = Decimal::from(1500);
        assert_eq!(BillStatus::from_payments(amount, Decimal::ZERO), BillStatus::Due);
        assert_eq!(
            BillStatus::from_payments(amount, Decimal::from(800)),
            BillStatus::Partial
        );
        assert_eq!(
            BillStatus::from_payments(amount, Decimal::from(1500)),
            BillStatus::Paid
        );
        assert_eq!(
            BillStatus::from_payments(amount, Decimal::from(2000)),
            BillStatus::Paid
        );
    }

    #[test]
    fn status_never_regresses_as_payments_accumulate() {
        let amount = Decimal::from(1000);
        let rank = |s: BillStatus| match s {
            BillStatus::Due => 0,
            BillStatus::Partial => 1,
            _ => 2,
        };

        let mut total = Decimal::ZERO;
        let mut last = rank(BillStatus::from_payments(amount, total));
        for step in [100, 250, 50, 600, 10] {
            total += Decimal::from(step);
            let current = rank(BillStatus::from_payments(amount, total));
            assert!(current >= last);
            last = current;
        }
        assert_eq!(last, 2);
    }

    #[test]
    fn invoice_number_is_zero_padded() {
        assert_eq!(format_invoice_number(2024, 1), "INV-2024-0001");
        assert_eq!(format_invoice_number(2024, 42), "INV-2024-0042");
        assert_eq!(format_invoice_number(2025, 12345), "INV-2025-12345");
    }

    #[test]
    fn only_paid_is_settled() {
        assert!(UNPAID_STATUSES.iter().all(|s| s.is_unpaid()));
        assert!(!BillStatus::Paid.is_unpaid());
    }
}
