//! Report read models.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::BillStatus;

/// Number of customers listed in [`DueSummary::top_due_customers`].
pub const TOP_DUE_LIMIT: usize = 5;

/// Outstanding money across a tenant.
#[derive(Debug, Clone, Serialize)]
pub struct DueSummary {
    pub total_due: Decimal,
    pub total_advance: Decimal,
    pub customers_with_due: i64,
    pub bills_due: i64,
    pub bills_partial: i64,
    pub bills_paid: i64,
    pub bills_overdue: i64,
    /// Share of bills fully paid, 0..=100 with two decimals.
    pub paid_percentage: Decimal,
    pub top_due_customers: Vec<TopDueCustomer>,
    pub generated_utc: DateTime<Utc>,
}

impl DueSummary {
    pub fn new(
        counts: BillStatusCounts,
        total_due: Decimal,
        total_advance: Decimal,
        customers_with_due: i64,
        mut top_due_customers: Vec<TopDueCustomer>,
    ) -> Self {
        top_due_customers.truncate(TOP_DUE_LIMIT);
        Self {
            total_due,
            total_advance,
            customers_with_due,
            bills_due: counts.due,
            bills_partial: counts.partial,
            bills_paid: counts.paid,
            bills_overdue: counts.overdue,
            paid_percentage: counts.paid_percentage(),
            top_due_customers,
            generated_utc: Utc::now(),
        }
    }
}

/// A customer ranked by due balance.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopDueCustomer {
    pub customer_id: Uuid,
    pub name: String,
    pub phone: String,
    pub due_balance: Decimal,
}

/// Bill counts per status, as read from the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct BillStatusCounts {
    pub due: i64,
    pub partial: i64,
    pub paid: i64,
    pub overdue: i64,
}

impl BillStatusCounts {
    pub fn add(&mut self, status: BillStatus, count: i64) {
        match status {
            BillStatus::Due => self.due += count,
            BillStatus::Partial => self.partial += count,
            BillStatus::Paid => self.paid += count,
            BillStatus::Overdue => self.overdue += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.due + self.partial + self.paid + self.overdue
    }

    pub fn paid_percentage(&self) -> Decimal {
        let total = self.total();
        if total == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.paid) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(2)
    }
}

/// Query parameters for the collection report.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Payments collected over a date range, inclusive on both ends.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_collected: Decimal,
    pub payment_count: i64,
    pub by_method: Vec<MethodTotal>,
}

impl CollectionSummary {
    pub fn from_method_totals(from: NaiveDate, to: NaiveDate, by_method: Vec<MethodTotal>) -> Self {
        let total_collected: Decimal = by_method.iter().map(|m| m.total).sum();
        let payment_count: i64 = by_method.iter().map(|m| m.payment_count).sum();
        Self {
            from,
            to,
            total_collected,
            payment_count,
            by_method,
        }
    }
}

/// Collected total for one payment method.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MethodTotal {
    pub method: String,
    pub payment_count: i64,
    pub total: Decimal,
}

/// Months in a revenue report when the caller does not ask for a count.
pub const DEFAULT_REVENUE_MONTHS: u32 = 6;

/// Upper bound on the months a revenue report covers.
pub const MAX_REVENUE_MONTHS: u32 = 24;

/// Query parameters for the revenue report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevenueQuery {
    pub months: Option<u32>,
    /// Last day covered. Defaults to today.
    pub as_of: Option<NaiveDate>,
}

/// First day of the month containing `day`.
pub fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

/// Billed or collected total for one calendar month, as read from the store.
#[derive(Debug, Clone, FromRow)]
pub struct MonthAmount {
    /// First day of the month.
    pub month: NaiveDate,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub billed: Decimal,
    pub collected: Decimal,
}

/// Billed against collected money per month, oldest month first.
#[derive(Debug, Clone, Serialize)]
pub struct RevenueReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub months: Vec<MonthlyRevenue>,
    pub total_billed: Decimal,
    pub total_collected: Decimal,
    /// Collected as a share of billed, 0 when nothing was billed.
    pub collection_rate: Decimal,
}

impl RevenueReport {
    /// Lay `billed` and `collected` out over every month from `from` to `to`,
    /// filling months without activity with zeros.
    pub fn from_month_amounts(
        from: NaiveDate,
        to: NaiveDate,
        billed: &[MonthAmount],
        collected: &[MonthAmount],
    ) -> Self {
        let total_for = |amounts: &[MonthAmount], month: NaiveDate| -> Decimal {
            amounts
                .iter()
                .filter(|a| month_start(a.month) == month)
                .map(|a| a.total)
                .sum()
        };

        let mut months = Vec::new();
        let mut month = month_start(from);
        while month <= to {
            months.push(MonthlyRevenue {
                month: format!("{:04}-{:02}", month.year(), month.month()),
                billed: total_for(billed, month),
                collected: total_for(collected, month),
            });
            match month.checked_add_months(Months::new(1)) {
                Some(next) => month = next,
                None => break,
            }
        }

        let total_billed: Decimal = months.iter().map(|m| m.billed).sum();
        let total_collected: Decimal = months.iter().map(|m| m.collected).sum();
        let collection_rate = if total_billed.is_zero() {
            Decimal::ZERO
        } else {
            (total_collected * Decimal::ONE_HUNDRED / total_billed).round_dp(2)
        };

        Self {
            from,
            to,
            months,
            total_billed,
            total_collected,
            collection_rate,
        }
    }
}

/// Customers on one package. A row with no `package_id` counts customers
/// without a package.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PackageShare {
    pub package_id: Option<Uuid>,
    pub name: Option<String>,
    pub speed_label: Option<String>,
    pub monthly_price: Option<Decimal>,
    pub customer_count: i64,
    pub active_customers: i64,
    /// Monthly price times active customers.
    pub monthly_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageDistribution {
    pub total_customers: i64,
    pub expected_monthly_revenue: Decimal,
    /// Largest package first.
    pub packages: Vec<PackageShare>,
    pub generated_utc: DateTime<Utc>,
}

impl PackageDistribution {
    pub fn new(mut packages: Vec<PackageShare>) -> Self {
        packages.sort_by(|a, b| {
            b.customer_count
                .cmp(&a.customer_count)
                .then_with(|| a.package_id.is_none().cmp(&b.package_id.is_none()))
                .then_with(|| a.name.cmp(&b.name))
        });
        Self {
            total_customers: packages.iter().map(|p| p.customer_count).sum(),
            expected_monthly_revenue: packages.iter().map(|p| p.monthly_revenue).sum(),
            packages,
            generated_utc: Utc::now(),
        }
    }
}
