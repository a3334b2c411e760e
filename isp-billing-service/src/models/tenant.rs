//! Tenant billing settings model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Currency used when a tenant has not configured one.
pub const DEFAULT_CURRENCY: &str = "BDT";

/// Per-tenant configuration consumed by the billing lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantSettings {
    pub tenant_id: Uuid,
    /// Days a bill may stay overdue before the customer is suspended.
    /// `0` means suspension is manual only.
    pub auto_suspend_days: i32,
    pub enable_online_payment: bool,
    pub currency: String,
    pub updated_utc: DateTime<Utc>,
}

impl TenantSettings {
    /// Settings applied to a tenant that never saved any.
    pub fn defaults(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            auto_suspend_days: 0,
            enable_online_payment: false,
            currency: DEFAULT_CURRENCY.to_string(),
            updated_utc: Utc::now(),
        }
    }

    pub fn auto_suspend_enabled(&self) -> bool {
        self.auto_suspend_days > 0
    }
}

/// Partial update of tenant settings. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTenantSettings {
    #[validate(range(min = 0, max = 365))]
    pub auto_suspend_days: Option<i32>,
    pub enable_online_payment: Option<bool>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
}

impl UpdateTenantSettings {
    /// Apply the patch on top of existing settings.
    pub fn apply_to(&self, mut settings: TenantSettings) -> TenantSettings {
        if let Some(days) = self.auto_suspend_days {
            settings.auto_suspend_days = days;
        }
        if let Some(enabled) = self.enable_online_payment {
            settings.enable_online_payment = enabled;
        }
        if let Some(ref currency) = self.currency {
            settings.currency = currency.to_uppercase();
        }
        settings.updated_utc = Utc::now();
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_manual_suspension() {
        let settings = TenantSettings::defaults(Uuid::new_v4());
        assert_eq!(settings.auto_suspend_days, 0);
        assert!(!settings.auto_suspend_enabled());
        assert_eq!(settings.currency, "BDT");
    }

    #[test]
    fn patch_keeps_unset_fields() {
        let base = TenantSettings::defaults(Uuid::new_v4());
        let patched = UpdateTenantSettings {
            auto_suspend_days: Some(10),
            ..Default::default()
        }
        .apply_to(base);

        assert_eq!(patched.auto_suspend_days, 10);
        assert!(!patched.enable_online_payment);
        assert_eq!(patched.currency, "BDT");
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let input = UpdateTenantSettings {
            auto_suspend_days: Some(-1),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }
}
