//! Dashboard reports.

use chrono::{Months, NaiveDate};
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

use super::BillingError;
use crate::models::{
    month_start, CollectionRange, CollectionSummary, DueSummary, PackageDistribution,
    RevenueQuery, RevenueReport, DEFAULT_REVENUE_MONTHS, MAX_REVENUE_MONTHS,
};
use crate::services::BillingStore;

#[instrument(skip(store), fields(tenant_id = %tenant_id))]
pub async fn due_summary(store: &dyn BillingStore, tenant_id: Uuid) -> Result<DueSummary, AppError> {
    store.due_summary(tenant_id).await
}

/// Payments collected between `range.from` and `range.to`, both inclusive.
#[instrument(skip(store), fields(tenant_id = %tenant_id, from = %range.from, to = %range.to))]
pub async fn collection_summary(
    store: &dyn BillingStore,
    tenant_id: Uuid,
    range: &CollectionRange,
) -> Result<CollectionSummary, AppError> {
    if range.to < range.from {
        return Err(BillingError::InvalidRange(format!(
            "{} is before {}",
            range.to, range.from
        ))
        .into());
    }
    store
        .collection_summary(tenant_id, range.from, range.to)
        .await
}

/// Billed against collected money for the `months` calendar months ending
/// with the month of `as_of`.
#[instrument(skip(store, query), fields(tenant_id = %tenant_id))]
pub async fn revenue_report(
    store: &dyn BillingStore,
    tenant_id: Uuid,
    query: &RevenueQuery,
    today: NaiveDate,
) -> Result<RevenueReport, AppError> {
    let months = query.months.unwrap_or(DEFAULT_REVENUE_MONTHS);
    if months == 0 || months > MAX_REVENUE_MONTHS {
        return Err(BillingError::InvalidRange(format!(
            "months must be between 1 and {}, got {}",
            MAX_REVENUE_MONTHS, months
        ))
        .into());
    }

    let to = query.as_of.unwrap_or(today);
    let from = month_start(to)
        .checked_sub_months(Months::new(months - 1))
        .ok_or_else(|| BillingError::InvalidRange(format!("{} months before {}", months, to)))?;

    let billed = store.monthly_billed(tenant_id, from, to).await?;
    let collected = store.monthly_collected(tenant_id, from, to).await?;
    Ok(RevenueReport::from_month_amounts(from, to, &billed, &collected))
}

/// Customers and expected monthly revenue per package.
#[instrument(skip(store), fields(tenant_id = %tenant_id))]
pub async fn package_distribution(
    store: &dyn BillingStore,
    tenant_id: Uuid,
) -> Result<PackageDistribution, AppError> {
    let shares = store.package_distribution(tenant_id).await?;
    Ok(PackageDistribution::new(shares))
}
