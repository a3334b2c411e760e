//! Domain models for isp-billing-service.

mod bill;
mod customer;
mod notification;
mod package;
mod payment;
mod report;
mod tenant;

pub use bill::{
    format_invoice_number, Bill, BillDraft, BillStatus, GenerateBills, ListBillsFilter,
    NewBillBatch, UNPAID_STATUSES,
};
pub use customer::{
    BillableCustomer, ConnectionStatus, CreateCustomer, Customer, CustomerBalances,
    ListCustomersFilter, SuspensionCandidate,
};
pub use notification::{
    CreatePushSubscription, ListNotificationsFilter, NewNotification, NotificationLog,
    NotificationStatus, PushSubscription, BILLING_REMINDER,
};
pub use package::{CreatePackage, ListPackagesFilter, Package};
pub use payment::{
    AppliedPayment, ListPaymentsFilter, Payment, PaymentMethod, PaymentOutcome, RecordPayment,
};
pub use report::{
    month_start, BillStatusCounts, CollectionRange, CollectionSummary, DueSummary, MethodTotal,
    MonthAmount, MonthlyRevenue, PackageDistribution, PackageShare, RevenueQuery, RevenueReport,
    TopDueCustomer, DEFAULT_REVENUE_MONTHS, MAX_REVENUE_MONTHS, TOP_DUE_LIMIT,
};
pub use tenant::{TenantSettings, UpdateTenantSettings, DEFAULT_CURRENCY};

/// Page size used when a list request does not ask for one.
pub const DEFAULT_PAGE_SIZE: i32 = 50;

/// Clamp a requested page size into `1..=100`, treating 0 as "unspecified".
pub fn effective_page_size(requested: i32) -> i64 {
    if requested <= 0 {
        DEFAULT_PAGE_SIZE as i64
    } else {
        requested.clamp(1, 100) as i64
    }
}
