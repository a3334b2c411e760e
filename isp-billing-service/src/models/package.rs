//! Internet package model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A sellable internet package. Its monthly price is what bill generation charges.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Package {
    pub package_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub speed_label: String,
    pub monthly_price: Decimal,
    pub validity_days: i32,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a package.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePackage {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub speed_label: String,
    pub monthly_price: Decimal,
    #[serde(default = "default_validity_days")]
    #[validate(range(min = 1, max = 366))]
    pub validity_days: i32,
}

fn default_validity_days() -> i32 {
    30
}

/// Filter parameters for listing packages.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPackagesFilter {
    #[serde(default)]
    pub include_inactive: bool,
}
