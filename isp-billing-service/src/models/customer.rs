//! Customer model and balance projection.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Connection status of a customer's line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Active,
    Suspended,
    Pending,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Active => "active",
            ConnectionStatus::Suspended => "suspended",
            ConnectionStatus::Pending => "pending",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "active" => ConnectionStatus::Active,
            "suspended" => ConnectionStatus::Suspended,
            _ => ConnectionStatus::Pending,
        }
    }
}

/// Customer of an ISP tenant.
///
/// `due_balance` and `advance_balance` are a projection of the bill and
/// payment ledger; see [`CustomerBalances`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub customer_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub package_id: Option<Uuid>,
    pub connection_status: String,
    pub due_balance: Decimal,
    pub advance_balance: Decimal,
    pub join_date: NaiveDate,
    pub last_payment_date: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Customer {
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_string(&self.connection_status)
    }
}

/// Input for creating a customer. New customers start as `pending`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomer {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 6, max = 20))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    pub package_id: Option<Uuid>,
    pub join_date: Option<NaiveDate>,
}

/// Filter parameters for listing customers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListCustomersFilter {
    pub status: Option<ConnectionStatus>,
    pub package_id: Option<Uuid>,
    #[serde(default)]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// An active customer with a package, as seen by bill generation.
#[derive(Debug, Clone, FromRow)]
pub struct BillableCustomer {
    pub customer_id: Uuid,
    pub package_id: Uuid,
    pub monthly_price: Decimal,
}

/// What the suspension sweep needs to know about one customer.
#[derive(Debug, Clone, FromRow)]
pub struct SuspensionCandidate {
    pub customer_id: Uuid,
    pub connection_status: String,
    pub due_balance: Decimal,
    pub earliest_unpaid_due_date: Option<NaiveDate>,
}

/// Customer balances derived from bills and payments.
///
/// Outstanding amounts and surpluses are never netted against each other:
/// a customer can owe on one bill while holding credit from another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerBalances {
    pub due_balance: Decimal,
    pub advance_balance: Decimal,
}

impl CustomerBalances {
    /// Project balances from `(bill amount, paid against bill)` pairs and the
    /// sum of payments that reference no bill.
    pub fn project<I>(bills: I, unapplied_payments: Decimal) -> Self
    where
        I: IntoIterator<Item = (Decimal, Decimal)>,
    {
        let mut balances = CustomerBalances {
            due_balance: Decimal::ZERO,
            advance_balance: unapplied_payments,
        };

        for (amount, paid) in bills {
            balances.due_balance += (amount - paid).max(Decimal::ZERO);
            balances.advance_balance += (paid - amount).max(Decimal::ZERO);
        }

        balances
    }
}
