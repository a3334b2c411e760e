//! PostgreSQL implementation of [`BillingStore`].

use crate::models::{
    effective_page_size, format_invoice_number, AppliedPayment, Bill, BillStatus,
    BillStatusCounts, BillableCustomer, CollectionSummary, ConnectionStatus, CreateCustomer,
    CreatePackage, CreatePushSubscription, Customer, DueSummary, ListBillsFilter,
    ListCustomersFilter, ListNotificationsFilter, ListPackagesFilter, ListPaymentsFilter,
    MethodTotal, MonthAmount, NewBillBatch, NewNotification, NotificationLog,
    NotificationStatus, Package, PackageShare, Payment, PushSubscription, RecordPayment,
    SuspensionCandidate, TenantSettings, TopDueCustomer, TOP_DUE_LIMIT,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::BillingStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgExecutor;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "isp-billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

/// Recompute the balance projection of `customer_ids` from bills and payments.
async fn recompute_balances<'e, E>(
    executor: E,
    tenant_id: Uuid,
    customer_ids: &[Uuid],
) -> Result<(), AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        WITH bill_totals AS (
            SELECT b.customer_id, b.amount, COALESCE(SUM(p.amount), 0) AS paid
            FROM bills b
            LEFT JOIN payments p ON p.tenant_id = b.tenant_id AND p.bill_id = b.bill_id
            WHERE b.tenant_id = $1 AND b.customer_id = ANY($2)
            GROUP BY b.bill_id, b.customer_id, b.amount
        )
        UPDATE customers c
        SET due_balance = COALESCE(
                (SELECT SUM(GREATEST(bt.amount - bt.paid, 0)) FROM bill_totals bt WHERE bt.customer_id = c.customer_id),
                0),
            advance_balance = COALESCE(
                (SELECT SUM(GREATEST(bt.paid - bt.amount, 0)) FROM bill_totals bt WHERE bt.customer_id = c.customer_id),
                0)
                + COALESCE(
                (SELECT SUM(p.amount) FROM payments p
                 WHERE p.tenant_id = c.tenant_id AND p.customer_id = c.customer_id AND p.bill_id IS NULL),
                0),
            updated_utc = NOW()
        WHERE c.tenant_id = $1 AND c.customer_id = ANY($2)
        "#,
    )
    .bind(tenant_id)
    .bind(customer_ids)
    .execute(executor)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to recompute balances: {}", e)))?;

    Ok(())
}

#[async_trait]
impl BillingStore for Database {
    /// Check database health.
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_tenant_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_tenant_ids"])
            .start_timer();

        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT tenant_id FROM customers ORDER BY tenant_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list tenants: {}", e)))?;

        timer.observe_duration();
        Ok(ids)
    }

    // =========================================================================
    // Tenant Settings
    // =========================================================================

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn get_tenant_settings(&self, tenant_id: Uuid) -> Result<TenantSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_tenant_settings"])
            .start_timer();

        let settings = sqlx::query_as::<_, TenantSettings>(
            r#"
            SELECT tenant_id, auto_suspend_days, enable_online_payment, currency, updated_utc
            FROM tenant_settings
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get settings: {}", e)))?;

        timer.observe_duration();
        Ok(settings.unwrap_or_else(|| TenantSettings::defaults(tenant_id)))
    }

    #[instrument(skip(self, settings), fields(tenant_id = %settings.tenant_id))]
    async fn upsert_tenant_settings(
        &self,
        settings: &TenantSettings,
    ) -> Result<TenantSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_tenant_settings"])
            .start_timer();

        let saved = sqlx::query_as::<_, TenantSettings>(
            r#"
            INSERT INTO tenant_settings (tenant_id, auto_suspend_days, enable_online_payment, currency)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id) DO UPDATE
            SET auto_suspend_days = EXCLUDED.auto_suspend_days,
                enable_online_payment = EXCLUDED.enable_online_payment,
                currency = EXCLUDED.currency,
                updated_utc = NOW()
            RETURNING tenant_id, auto_suspend_days, enable_online_payment, currency, updated_utc
            "#,
        )
        .bind(settings.tenant_id)
        .bind(settings.auto_suspend_days)
        .bind(settings.enable_online_payment)
        .bind(&settings.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to save settings: {}", e)))?;

        timer.observe_duration();
        info!(auto_suspend_days = saved.auto_suspend_days, "Tenant settings saved");
        Ok(saved)
    }

    // =========================================================================
    // Package Operations
    // =========================================================================

    #[instrument(skip(self, input), fields(tenant_id = %tenant_id))]
    async fn create_package(
        &self,
        tenant_id: Uuid,
        input: &CreatePackage,
    ) -> Result<Package, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_package"])
            .start_timer();

        let package = sqlx::query_as::<_, Package>(
            r#"
            INSERT INTO packages (package_id, tenant_id, name, speed_label, monthly_price, validity_days)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING package_id, tenant_id, name, speed_label, monthly_price, validity_days, is_active, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.speed_label)
        .bind(input.monthly_price)
        .bind(input.validity_days)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create package: {}", e)))?;

        timer.observe_duration();
        info!(package_id = %package.package_id, name = %package.name, "Package created");
        Ok(package)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, package_id = %package_id))]
    async fn get_package(
        &self,
        tenant_id: Uuid,
        package_id: Uuid,
    ) -> Result<Option<Package>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_package"])
            .start_timer();

        let package = sqlx::query_as::<_, Package>(
            r#"
            SELECT package_id, tenant_id, name, speed_label, monthly_price, validity_days, is_active, created_utc, updated_utc
            FROM packages
            WHERE tenant_id = $1 AND package_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(package_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get package: {}", e)))?;

        timer.observe_duration();
        Ok(package)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn list_packages(
        &self,
        tenant_id: Uuid,
        filter: &ListPackagesFilter,
    ) -> Result<Vec<Package>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_packages"])
            .start_timer();

        let packages = sqlx::query_as::<_, Package>(
            r#"
            SELECT package_id, tenant_id, name, speed_label, monthly_price, validity_days, is_active, created_utc, updated_utc
            FROM packages
            WHERE tenant_id = $1
              AND ($2::bool = TRUE OR is_active = TRUE)
            ORDER BY monthly_price, name
            "#,
        )
        .bind(tenant_id)
        .bind(filter.include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list packages: {}", e)))?;

        timer.observe_duration();
        Ok(packages)
    }

    // =========================================================================
    // Customer Operations
    // =========================================================================

    #[instrument(skip(self, input), fields(tenant_id = %tenant_id))]
    async fn create_customer(
        &self,
        tenant_id: Uuid,
        input: &CreateCustomer,
        join_date: NaiveDate,
    ) -> Result<Customer, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (customer_id, tenant_id, name, phone, email, address, package_id, connection_status, join_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING customer_id, tenant_id, name, phone, email, address, package_id, connection_status, due_balance, advance_balance, join_date, last_payment_date, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(input.package_id)
        .bind(ConnectionStatus::Pending.as_str())
        .bind(join_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create customer: {}", e)))?;

        timer.observe_duration();
        info!(customer_id = %customer.customer_id, "Customer created");
        Ok(customer)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    async fn get_customer(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, tenant_id, name, phone, email, address, package_id, connection_status, due_balance, advance_balance, join_date, last_payment_date, created_utc, updated_utc
            FROM customers
            WHERE tenant_id = $1 AND customer_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get customer: {}", e)))?;

        timer.observe_duration();
        Ok(customer)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn list_customers(
        &self,
        tenant_id: Uuid,
        filter: &ListCustomersFilter,
    ) -> Result<Vec<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customers"])
            .start_timer();

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, tenant_id, name, phone, email, address, package_id, connection_status, due_balance, advance_balance, join_date, last_payment_date, created_utc, updated_utc
            FROM customers
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR connection_status = $2)
              AND ($3::uuid IS NULL OR package_id = $3)
              AND ($4::uuid IS NULL OR customer_id > $4)
            ORDER BY customer_id
            LIMIT $5
            "#,
        )
        .bind(tenant_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.package_id)
        .bind(filter.page_token)
        .bind(effective_page_size(filter.page_size))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list customers: {}", e)))?;

        timer.observe_duration();
        Ok(customers)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id, status = %status.as_str()))]
    async fn update_customer_status(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        status: ConnectionStatus,
    ) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_customer_status"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET connection_status = $3, updated_utc = NOW()
            WHERE tenant_id = $1 AND customer_id = $2
            RETURNING customer_id, tenant_id, name, phone, email, address, package_id, connection_status, due_balance, advance_balance, join_date, last_payment_date, created_utc, updated_utc
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update customer status: {}", e))
        })?;

        timer.observe_duration();
        Ok(customer)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn find_billable_customers(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<BillableCustomer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_billable_customers"])
            .start_timer();

        let customers = sqlx::query_as::<_, BillableCustomer>(
            r#"
            SELECT c.customer_id, p.package_id, p.monthly_price
            FROM customers c
            JOIN packages p ON p.tenant_id = c.tenant_id AND p.package_id = c.package_id
            WHERE c.tenant_id = $1 AND c.connection_status = 'active'
            ORDER BY c.join_date, c.customer_id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find billable customers: {}", e))
        })?;

        timer.observe_duration();
        Ok(customers)
    }

    #[instrument(skip(self, customer_ids), fields(tenant_id = %tenant_id, count = customer_ids.len()))]
    async fn recompute_customer_balances(
        &self,
        tenant_id: Uuid,
        customer_ids: &[Uuid],
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recompute_customer_balances"])
            .start_timer();

        recompute_balances(&self.pool, tenant_id, customer_ids).await?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_suspension_candidates(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<SuspensionCandidate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_suspension_candidates"])
            .start_timer();

        let candidates = sqlx::query_as::<_, SuspensionCandidate>(
            r#"
            SELECT c.customer_id, c.connection_status, c.due_balance,
                   (SELECT MIN(b.due_date) FROM bills b
                    WHERE b.tenant_id = c.tenant_id
                      AND b.customer_id = c.customer_id
                      AND b.status IN ('due', 'partial', 'overdue')) AS earliest_unpaid_due_date
            FROM customers c
            WHERE c.tenant_id = $1 AND c.connection_status IN ('active', 'suspended')
            ORDER BY c.customer_id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list suspension candidates: {}", e))
        })?;

        timer.observe_duration();
        Ok(candidates)
    }

    // =========================================================================
    // Bill Operations
    // =========================================================================

    #[instrument(skip(self, batch), fields(tenant_id = %tenant_id, bill_count = batch.drafts.len()))]
    async fn insert_bill_batch(
        &self,
        tenant_id: Uuid,
        batch: &NewBillBatch,
    ) -> Result<Vec<Bill>, AppError> {
        if batch.drafts.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_bill_batch"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let count = batch.drafts.len() as i64;
        let last_value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO invoice_sequences (tenant_id, year, last_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, year) DO UPDATE
            SET last_value = invoice_sequences.last_value + EXCLUDED.last_value
            RETURNING last_value
            "#,
        )
        .bind(tenant_id)
        .bind(batch.invoice_year)
        .bind(count)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to allocate invoice numbers: {}", e))
        })?;

        let first_sequence = last_value - count + 1;
        let mut bills = Vec::with_capacity(batch.drafts.len());

        for (offset, draft) in batch.drafts.iter().enumerate() {
            let invoice_number =
                format_invoice_number(batch.invoice_year, first_sequence + offset as i64);

            let bill = sqlx::query_as::<_, Bill>(
                r#"
                INSERT INTO bills (bill_id, tenant_id, customer_id, amount, billing_period_start, billing_period_end, due_date, status, invoice_number, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING bill_id, tenant_id, customer_id, amount, billing_period_start, billing_period_end, due_date, status, invoice_number, notes, created_utc, updated_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(draft.customer_id)
            .bind(draft.amount)
            .bind(batch.billing_period_start)
            .bind(batch.billing_period_end)
            .bind(batch.due_date)
            .bind(BillStatus::Due.as_str())
            .bind(&invoice_number)
            .bind(&batch.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Invoice number {} already exists",
                        invoice_number
                    ))
                }
                e => AppError::DatabaseError(anyhow::anyhow!("Failed to insert bill: {}", e)),
            })?;

            bills.push(bill);
        }

        let customer_ids: Vec<Uuid> = batch.drafts.iter().map(|d| d.customer_id).collect();
        recompute_balances(&mut *tx, tenant_id, &customer_ids).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            bill_count = bills.len(),
            first_invoice = %format_invoice_number(batch.invoice_year, first_sequence),
            "Bill batch inserted"
        );

        Ok(bills)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, bill_id = %bill_id))]
    async fn get_bill(&self, tenant_id: Uuid, bill_id: Uuid) -> Result<Option<Bill>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_bill"])
            .start_timer();

        let bill = sqlx::query_as::<_, Bill>(
            r#"
            SELECT bill_id, tenant_id, customer_id, amount, billing_period_start, billing_period_end, due_date, status, invoice_number, notes, created_utc, updated_utc
            FROM bills
            WHERE tenant_id = $1 AND bill_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(bill_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get bill: {}", e)))?;

        timer.observe_duration();
        Ok(bill)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn list_bills(
        &self,
        tenant_id: Uuid,
        filter: &ListBillsFilter,
    ) -> Result<Vec<Bill>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_bills"])
            .start_timer();

        let bills = sqlx::query_as::<_, Bill>(
            r#"
            SELECT bill_id, tenant_id, customer_id, amount, billing_period_start, billing_period_end, due_date, status, invoice_number, notes, created_utc, updated_utc
            FROM bills
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR customer_id = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::date IS NULL OR due_date = $4)
              AND ($5::uuid IS NULL OR bill_id > $5)
            ORDER BY bill_id
            LIMIT $6
            "#,
        )
        .bind(tenant_id)
        .bind(filter.customer_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.due_date)
        .bind(filter.page_token)
        .bind(effective_page_size(filter.page_size))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list bills: {}", e)))?;

        timer.observe_duration();
        Ok(bills)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, due_date = %due_date))]
    async fn find_unpaid_bills_due_on(
        &self,
        tenant_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Vec<Bill>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_unpaid_bills_due_on"])
            .start_timer();

        let bills = sqlx::query_as::<_, Bill>(
            r#"
            SELECT bill_id, tenant_id, customer_id, amount, billing_period_start, billing_period_end, due_date, status, invoice_number, notes, created_utc, updated_utc
            FROM bills
            WHERE tenant_id = $1
              AND due_date = $2
              AND status IN ('due', 'partial', 'overdue')
            ORDER BY bill_id
            "#,
        )
        .bind(tenant_id)
        .bind(due_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find due bills: {}", e)))?;

        timer.observe_duration();
        Ok(bills)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, today = %today))]
    async fn mark_overdue_bills(
        &self,
        tenant_id: Uuid,
        today: NaiveDate,
    ) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_overdue_bills"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE bills
            SET status = 'overdue', updated_utc = NOW()
            WHERE tenant_id = $1
              AND status IN ('due', 'partial')
              AND due_date < $2
            "#,
        )
        .bind(tenant_id)
        .bind(today)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to mark overdue: {}", e)))?;

        timer.observe_duration();
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Payment Operations
    // =========================================================================

    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, customer_id = %input.customer_id))]
    async fn apply_payment(
        &self,
        tenant_id: Uuid,
        input: &RecordPayment,
        today: NaiveDate,
    ) -> Result<AppliedPayment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Lock order: customer, then bill.
        let customer_exists = sqlx::query_scalar::<_, Uuid>(
            "SELECT customer_id FROM customers WHERE tenant_id = $1 AND customer_id = $2 FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(input.customer_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock customer: {}", e)))?
        .is_some();

        if !customer_exists {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Customer {} not found",
                input.customer_id
            )));
        }

        let locked_bill = match input.bill_id {
            Some(bill_id) => {
                let bill = sqlx::query_as::<_, Bill>(
                    r#"
                    SELECT bill_id, tenant_id, customer_id, amount, billing_period_start, billing_period_end, due_date, status, invoice_number, notes, created_utc, updated_utc
                    FROM bills
                    WHERE tenant_id = $1 AND bill_id = $2
                    FOR UPDATE
                    "#,
                )
                .bind(tenant_id)
                .bind(bill_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock bill: {}", e)))?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Bill {} not found", bill_id)))?;

                if bill.customer_id != input.customer_id {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Bill {} does not belong to customer {}",
                        bill_id,
                        input.customer_id
                    )));
                }
                Some(bill)
            }
            None => None,
        };

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (payment_id, tenant_id, customer_id, bill_id, amount, method, reference, notes, recorded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING payment_id, tenant_id, customer_id, bill_id, amount, method, reference, notes, recorded_by, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(input.customer_id)
        .bind(input.bill_id)
        .bind(input.amount)
        .bind(input.method.as_str())
        .bind(&input.reference)
        .bind(&input.notes)
        .bind(&input.recorded_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment: {}", e)))?;

        let bill = match locked_bill {
            Some(bill) => {
                let total_paid = sqlx::query_scalar::<_, Decimal>(
                    "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE tenant_id = $1 AND bill_id = $2",
                )
                .bind(tenant_id)
                .bind(bill.bill_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e))
                })?;

                let status = BillStatus::from_payments(bill.amount, total_paid);

                let updated = sqlx::query_as::<_, Bill>(
                    r#"
                    UPDATE bills
                    SET status = $3, updated_utc = NOW()
                    WHERE tenant_id = $1 AND bill_id = $2
                    RETURNING bill_id, tenant_id, customer_id, amount, billing_period_start, billing_period_end, due_date, status, invoice_number, notes, created_utc, updated_utc
                    "#,
                )
                .bind(tenant_id)
                .bind(bill.bill_id)
                .bind(status.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to update bill status: {}", e))
                })?;

                Some(updated)
            }
            None => None,
        };

        recompute_balances(&mut *tx, tenant_id, &[input.customer_id]).await?;

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET last_payment_date = $3, updated_utc = NOW()
            WHERE tenant_id = $1 AND customer_id = $2
            RETURNING customer_id, tenant_id, name, phone, email, address, package_id, connection_status, due_balance, advance_balance, join_date, last_payment_date, created_utc, updated_utc
            "#,
        )
        .bind(tenant_id)
        .bind(input.customer_id)
        .bind(today)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update last payment date: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            bill_status = bill.as_ref().map(|b| b.status.as_str()).unwrap_or("none"),
            "Payment applied"
        );

        Ok(AppliedPayment {
            payment,
            bill,
            customer,
        })
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn list_payments(
        &self,
        tenant_id: Uuid,
        filter: &ListPaymentsFilter,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, tenant_id, customer_id, bill_id, amount, method, reference, notes, recorded_by, created_utc
            FROM payments
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR customer_id = $2)
              AND ($3::uuid IS NULL OR bill_id = $3)
              AND ($4::date IS NULL OR created_utc::date >= $4)
              AND ($5::date IS NULL OR created_utc::date <= $5)
            ORDER BY created_utc, payment_id
            "#,
        )
        .bind(tenant_id)
        .bind(filter.customer_id)
        .bind(filter.bill_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();
        Ok(payments)
    }

    // =========================================================================
    // Notification Operations
    // =========================================================================

    #[instrument(skip(self, notification), fields(tenant_id = %tenant_id, customer_id = %notification.customer_id))]
    async fn insert_notification_if_absent(
        &self,
        tenant_id: Uuid,
        notification: &NewNotification,
    ) -> Result<Option<NotificationLog>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_notification_if_absent"])
            .start_timer();

        let inserted = sqlx::query_as::<_, NotificationLog>(
            r#"
            INSERT INTO notification_logs (notification_id, tenant_id, customer_id, notification_type, title, body, data, status, dedup_day)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (tenant_id, customer_id, notification_type, dedup_day) DO NOTHING
            RETURNING notification_id, tenant_id, customer_id, notification_type, title, body, data, status, dedup_day, created_utc, sent_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(notification.customer_id)
        .bind(&notification.notification_type)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.data)
        .bind(NotificationStatus::Pending.as_str())
        .bind(notification.dedup_day)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert notification: {}", e))
        })?;

        timer.observe_duration();
        Ok(inserted)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, notification_id = %notification_id))]
    async fn update_notification_status(
        &self,
        tenant_id: Uuid,
        notification_id: Uuid,
        status: NotificationStatus,
        sent_utc: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_notification_status"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE notification_logs
            SET status = $3, sent_utc = COALESCE($4, sent_utc)
            WHERE tenant_id = $1 AND notification_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(notification_id)
        .bind(status.as_str())
        .bind(sent_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update notification: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn list_notifications(
        &self,
        tenant_id: Uuid,
        filter: &ListNotificationsFilter,
    ) -> Result<Vec<NotificationLog>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_notifications"])
            .start_timer();

        let notifications = sqlx::query_as::<_, NotificationLog>(
            r#"
            SELECT notification_id, tenant_id, customer_id, notification_type, title, body, data, status, dedup_day, created_utc, sent_utc
            FROM notification_logs
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR customer_id = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::date IS NULL OR dedup_day = $4)
            ORDER BY created_utc DESC, notification_id
            "#,
        )
        .bind(tenant_id)
        .bind(filter.customer_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.day)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list notifications: {}", e))
        })?;

        timer.observe_duration();
        Ok(notifications)
    }

    // =========================================================================
    // Push Subscription Operations
    // =========================================================================

    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    async fn create_push_subscription(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        input: &CreatePushSubscription,
    ) -> Result<PushSubscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_push_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, PushSubscription>(
            r#"
            INSERT INTO push_subscriptions (subscription_id, tenant_id, customer_id, endpoint, p256dh, auth)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id, customer_id, endpoint) DO UPDATE
            SET p256dh = EXCLUDED.p256dh, auth = EXCLUDED.auth, is_active = TRUE
            RETURNING subscription_id, tenant_id, customer_id, endpoint, p256dh, auth, is_active, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(customer_id)
        .bind(&input.endpoint)
        .bind(&input.p256dh)
        .bind(&input.auth)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create push subscription: {}", e))
        })?;

        timer.observe_duration();
        Ok(subscription)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, subscription_id = %subscription_id))]
    async fn deactivate_push_subscription(
        &self,
        tenant_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["deactivate_push_subscription"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE push_subscriptions
            SET is_active = FALSE
            WHERE tenant_id = $1 AND subscription_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(subscription_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to deactivate subscription: {}", e))
        })?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    async fn list_active_push_subscriptions(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Vec<PushSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_active_push_subscriptions"])
            .start_timer();

        let subscriptions = sqlx::query_as::<_, PushSubscription>(
            r#"
            SELECT subscription_id, tenant_id, customer_id, endpoint, p256dh, auth, is_active, created_utc
            FROM push_subscriptions
            WHERE tenant_id = $1 AND customer_id = $2 AND is_active = TRUE
            ORDER BY created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list push subscriptions: {}", e))
        })?;

        timer.observe_duration();
        Ok(subscriptions)
    }

    // =========================================================================
    // Reports
    // =========================================================================

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn due_summary(&self, tenant_id: Uuid) -> Result<DueSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["due_summary"])
            .start_timer();

        let status_rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM bills WHERE tenant_id = $1 GROUP BY status",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count bills: {}", e)))?;

        let mut counts = BillStatusCounts::default();
        for (status, count) in status_rows {
            counts.add(BillStatus::from_string(&status), count);
        }

        let (total_due, total_advance, customers_with_due) =
            sqlx::query_as::<_, (Decimal, Decimal, i64)>(
                r#"
                SELECT COALESCE(SUM(due_balance), 0),
                       COALESCE(SUM(advance_balance), 0),
                       COUNT(*) FILTER (WHERE due_balance > 0)
                FROM customers
                WHERE tenant_id = $1
                "#,
            )
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to total balances: {}", e))
            })?;

        let top = sqlx::query_as::<_, TopDueCustomer>(
            r#"
            SELECT customer_id, name, phone, due_balance
            FROM customers
            WHERE tenant_id = $1 AND due_balance > 0
            ORDER BY due_balance DESC, customer_id
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(TOP_DUE_LIMIT as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to rank due customers: {}", e))
        })?;

        timer.observe_duration();
        Ok(DueSummary::new(
            counts,
            total_due,
            total_advance,
            customers_with_due,
            top,
        ))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, from = %from, to = %to))]
    async fn collection_summary(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CollectionSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["collection_summary"])
            .start_timer();

        let by_method = sqlx::query_as::<_, MethodTotal>(
            r#"
            SELECT method, COUNT(*) AS payment_count, COALESCE(SUM(amount), 0) AS total
            FROM payments
            WHERE tenant_id = $1
              AND created_utc::date BETWEEN $2 AND $3
            GROUP BY method
            ORDER BY method
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to summarize collections: {}", e))
        })?;

        timer.observe_duration();
        Ok(CollectionSummary::from_method_totals(from, to, by_method))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn monthly_billed(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MonthAmount>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["monthly_billed"])
            .start_timer();

        let months = sqlx::query_as::<_, MonthAmount>(
            r#"
            SELECT date_trunc('month', billing_period_start)::date AS month,
                   COALESCE(SUM(amount), 0) AS total
            FROM bills
            WHERE tenant_id = $1
              AND billing_period_start BETWEEN $2 AND $3
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to total bills by month: {}", e))
        })?;

        timer.observe_duration();
        Ok(months)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn monthly_collected(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MonthAmount>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["monthly_collected"])
            .start_timer();

        let months = sqlx::query_as::<_, MonthAmount>(
            r#"
            SELECT date_trunc('month', created_utc::date)::date AS month,
                   COALESCE(SUM(amount), 0) AS total
            FROM payments
            WHERE tenant_id = $1
              AND created_utc::date BETWEEN $2 AND $3
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to total payments by month: {}", e))
        })?;

        timer.observe_duration();
        Ok(months)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn package_distribution(&self, tenant_id: Uuid) -> Result<Vec<PackageShare>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["package_distribution"])
            .start_timer();

        let shares = sqlx::query_as::<_, PackageShare>(
            r#"
            SELECT c.package_id, p.name, p.speed_label, p.monthly_price,
                   COUNT(*) AS customer_count,
                   COUNT(*) FILTER (WHERE c.connection_status = 'active') AS active_customers,
                   COALESCE(p.monthly_price, 0)
                       * COUNT(*) FILTER (WHERE c.connection_status = 'active') AS monthly_revenue
            FROM customers c
            LEFT JOIN packages p ON p.tenant_id = c.tenant_id AND p.package_id = c.package_id
            WHERE c.tenant_id = $1
            GROUP BY c.package_id, p.name, p.speed_label, p.monthly_price
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load package distribution: {}", e))
        })?;

        timer.observe_duration();
        Ok(shares)
    }
}
