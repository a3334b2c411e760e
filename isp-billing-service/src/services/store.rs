//! Tenant-scoped storage interface for the billing lifecycle.
//!
//! Every method takes the tenant id explicitly; implementations must never
//! read or write rows of another tenant. Compound operations
//! (`insert_bill_batch`, `apply_payment`, `insert_notification_if_absent`)
//! are atomic with respect to concurrent callers.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    AppliedPayment, Bill, BillableCustomer, CollectionSummary, ConnectionStatus, CreateCustomer,
    CreatePackage, CreatePushSubscription, Customer, DueSummary, ListBillsFilter,
    ListCustomersFilter, ListNotificationsFilter, ListPackagesFilter, ListPaymentsFilter,
    MonthAmount, NewBillBatch, NewNotification, NotificationLog, NotificationStatus, Package,
    PackageShare, Payment, PushSubscription, RecordPayment, SuspensionCandidate, TenantSettings,
};

#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    /// Tenants that have any customer, used by the background job runner.
    async fn list_tenant_ids(&self) -> Result<Vec<Uuid>, AppError>;

    // Tenant settings

    /// Stored settings, or defaults when the tenant never saved any.
    async fn get_tenant_settings(&self, tenant_id: Uuid) -> Result<TenantSettings, AppError>;

    async fn upsert_tenant_settings(
        &self,
        settings: &TenantSettings,
    ) -> Result<TenantSettings, AppError>;

    // Packages

    async fn create_package(
        &self,
        tenant_id: Uuid,
        input: &CreatePackage,
    ) -> Result<Package, AppError>;

    async fn get_package(
        &self,
        tenant_id: Uuid,
        package_id: Uuid,
    ) -> Result<Option<Package>, AppError>;

    async fn list_packages(
        &self,
        tenant_id: Uuid,
        filter: &ListPackagesFilter,
    ) -> Result<Vec<Package>, AppError>;

    // Customers

    /// Create a customer with status `pending` and zero balances.
    async fn create_customer(
        &self,
        tenant_id: Uuid,
        input: &CreateCustomer,
        join_date: NaiveDate,
    ) -> Result<Customer, AppError>;

    async fn get_customer(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, AppError>;

    async fn list_customers(
        &self,
        tenant_id: Uuid,
        filter: &ListCustomersFilter,
    ) -> Result<Vec<Customer>, AppError>;

    async fn update_customer_status(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        status: ConnectionStatus,
    ) -> Result<Option<Customer>, AppError>;

    /// Active customers with an assigned package, ordered by join date then id.
    async fn find_billable_customers(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<BillableCustomer>, AppError>;

    /// Recompute the due/advance projection of the given customers from their
    /// bills and payments.
    async fn recompute_customer_balances(
        &self,
        tenant_id: Uuid,
        customer_ids: &[Uuid],
    ) -> Result<(), AppError>;

    /// Active and suspended customers with the due date of their earliest
    /// unpaid bill.
    async fn list_suspension_candidates(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<SuspensionCandidate>, AppError>;

    // Bills

    /// Insert a whole batch, allocating invoice numbers from the tenant's
    /// sequence for `batch.invoice_year` and refreshing the billed customers'
    /// balances. Nothing is written if any step fails.
    async fn insert_bill_batch(
        &self,
        tenant_id: Uuid,
        batch: &NewBillBatch,
    ) -> Result<Vec<Bill>, AppError>;

    async fn get_bill(&self, tenant_id: Uuid, bill_id: Uuid) -> Result<Option<Bill>, AppError>;

    async fn list_bills(
        &self,
        tenant_id: Uuid,
        filter: &ListBillsFilter,
    ) -> Result<Vec<Bill>, AppError>;

    /// Bills due exactly on `due_date` that are not fully paid.
    async fn find_unpaid_bills_due_on(
        &self,
        tenant_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Vec<Bill>, AppError>;

    /// Promote `due`/`partial` bills whose due date is before `today` to
    /// `overdue`. Returns the number of bills changed.
    async fn mark_overdue_bills(&self, tenant_id: Uuid, today: NaiveDate)
        -> Result<u64, AppError>;

    // Payments

    /// Record a payment and settle the referenced bill in one atomic unit.
    ///
    /// The customer must exist; a referenced bill must exist and belong to
    /// that customer. The bill's status is recomputed from the sum of its
    /// payments, the customer's `last_payment_date` becomes `today` and the
    /// balance projection is refreshed.
    async fn apply_payment(
        &self,
        tenant_id: Uuid,
        input: &RecordPayment,
        today: NaiveDate,
    ) -> Result<AppliedPayment, AppError>;

    async fn list_payments(
        &self,
        tenant_id: Uuid,
        filter: &ListPaymentsFilter,
    ) -> Result<Vec<Payment>, AppError>;

    // Notifications

    /// Insert a `pending` entry unless one already exists for
    /// (tenant, customer, type, dedup day). Returns `None` on conflict.
    async fn insert_notification_if_absent(
        &self,
        tenant_id: Uuid,
        notification: &NewNotification,
    ) -> Result<Option<NotificationLog>, AppError>;

    async fn update_notification_status(
        &self,
        tenant_id: Uuid,
        notification_id: Uuid,
        status: NotificationStatus,
        sent_utc: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;

    async fn list_notifications(
        &self,
        tenant_id: Uuid,
        filter: &ListNotificationsFilter,
    ) -> Result<Vec<NotificationLog>, AppError>;

    // Push subscriptions

    async fn create_push_subscription(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        input: &CreatePushSubscription,
    ) -> Result<PushSubscription, AppError>;

    /// Returns `false` when no subscription matched.
    async fn deactivate_push_subscription(
        &self,
        tenant_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<bool, AppError>;

    async fn list_active_push_subscriptions(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Vec<PushSubscription>, AppError>;

    // Reports

    async fn due_summary(&self, tenant_id: Uuid) -> Result<DueSummary, AppError>;

    async fn collection_summary(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CollectionSummary, AppError>;

    /// Bill amounts per month of their billing period start, within `from..=to`.
    async fn monthly_billed(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MonthAmount>, AppError>;

    /// Payment amounts per month received, within `from..=to`.
    async fn monthly_collected(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MonthAmount>, AppError>;

    async fn package_distribution(&self, tenant_id: Uuid) -> Result<Vec<PackageShare>, AppError>;
}
