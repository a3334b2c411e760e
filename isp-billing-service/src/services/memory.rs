//! In-memory implementation of [`BillingStore`].
//!
//! Used by tests and local runs without PostgreSQL. One mutex guards all
//! state, so every compound operation is atomic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    effective_page_size, month_start, format_invoice_number, AppliedPayment, Bill, BillStatus,
    BillStatusCounts, BillableCustomer, CollectionSummary, ConnectionStatus, CreateCustomer,
    CreatePackage, CreatePushSubscription, Customer, CustomerBalances, DueSummary,
    ListBillsFilter, ListCustomersFilter, ListNotificationsFilter, ListPackagesFilter,
    ListPaymentsFilter, MethodTotal, MonthAmount, NewBillBatch, NewNotification, NotificationLog,
    NotificationStatus, Package, PackageShare, Payment, PushSubscription, RecordPayment,
    SuspensionCandidate, TenantSettings, TopDueCustomer, TOP_DUE_LIMIT,
};
use crate::services::store::BillingStore;

#[derive(Default)]
struct State {
    settings: HashMap<Uuid, TenantSettings>,
    packages: Vec<Package>,
    customers: Vec<Customer>,
    bills: Vec<Bill>,
    payments: Vec<Payment>,
    notifications: Vec<NotificationLog>,
    subscriptions: Vec<PushSubscription>,
    sequences: HashMap<(Uuid, i32), i64>,
}

impl State {
    fn customer_mut(&mut self, tenant_id: Uuid, customer_id: Uuid) -> Option<&mut Customer> {
        self.customers
            .iter_mut()
            .find(|c| c.tenant_id == tenant_id && c.customer_id == customer_id)
    }

    fn paid_on_bill(&self, tenant_id: Uuid, bill_id: Uuid) -> Decimal {
        self.payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.bill_id == Some(bill_id))
            .map(|p| p.amount)
            .sum()
    }

    fn recompute(&mut self, tenant_id: Uuid, customer_ids: &[Uuid]) {
        for &customer_id in customer_ids {
            let bills: Vec<(Decimal, Decimal)> = self
                .bills
                .iter()
                .filter(|b| b.tenant_id == tenant_id && b.customer_id == customer_id)
                .map(|b| (b.amount, self.paid_on_bill(tenant_id, b.bill_id)))
                .collect();
            let unapplied: Decimal = self
                .payments
                .iter()
                .filter(|p| {
                    p.tenant_id == tenant_id && p.customer_id == customer_id && p.bill_id.is_none()
                })
                .map(|p| p.amount)
                .sum();

            let balances = CustomerBalances::project(bills, unapplied);
            if let Some(customer) = self.customer_mut(tenant_id, customer_id) {
                customer.due_balance = balances.due_balance;
                customer.advance_balance = balances.advance_balance;
                customer.updated_utc = Utc::now();
            }
        }
    }
}

/// Mutex-guarded store holding every tenant's data in memory.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T, F>(mut rows: Vec<T>, page_size: i32, page_token: Option<Uuid>, id: F) -> Vec<T>
where
    F: Fn(&T) -> Uuid,
{
    rows.sort_by_key(|r| id(r));
    rows.into_iter()
        .filter(|r| page_token.map_or(true, |cursor| id(r) > cursor))
        .take(effective_page_size(page_size) as usize)
        .collect()
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn list_tenant_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let state = self.state.lock().await;
        let mut ids: Vec<Uuid> = state.customers.iter().map(|c| c.tenant_id).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn get_tenant_settings(&self, tenant_id: Uuid) -> Result<TenantSettings, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .settings
            .get(&tenant_id)
            .cloned()
            .unwrap_or_else(|| TenantSettings::defaults(tenant_id)))
    }

    async fn upsert_tenant_settings(
        &self,
        settings: &TenantSettings,
    ) -> Result<TenantSettings, AppError> {
        let mut state = self.state.lock().await;
        let mut saved = settings.clone();
        saved.updated_utc = Utc::now();
        state.settings.insert(saved.tenant_id, saved.clone());
        Ok(saved)
    }

    async fn create_package(
        &self,
        tenant_id: Uuid,
        input: &CreatePackage,
    ) -> Result<Package, AppError> {
        let now = Utc::now();
        let package = Package {
            package_id: Uuid::new_v4(),
            tenant_id,
            name: input.name.clone(),
            speed_label: input.speed_label.clone(),
            monthly_price: input.monthly_price,
            validity_days: input.validity_days,
            is_active: true,
            created_utc: now,
            updated_utc: now,
        };
        self.state.lock().await.packages.push(package.clone());
        Ok(package)
    }

    async fn get_package(
        &self,
        tenant_id: Uuid,
        package_id: Uuid,
    ) -> Result<Option<Package>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .packages
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.package_id == package_id)
            .cloned())
    }

    async fn list_packages(
        &self,
        tenant_id: Uuid,
        filter: &ListPackagesFilter,
    ) -> Result<Vec<Package>, AppError> {
        let state = self.state.lock().await;
        let mut packages: Vec<Package> = state
            .packages
            .iter()
            .filter(|p| p.tenant_id == tenant_id && (filter.include_inactive || p.is_active))
            .cloned()
            .collect();
        packages.sort_by(|a, b| {
            a.monthly_price
                .cmp(&b.monthly_price)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(packages)
    }

    async fn create_customer(
        &self,
        tenant_id: Uuid,
        input: &CreateCustomer,
        join_date: NaiveDate,
    ) -> Result<Customer, AppError> {
        let now = Utc::now();
        let customer = Customer {
            customer_id: Uuid::new_v4(),
            tenant_id,
            name: input.name.clone(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            address: input.address.clone(),
            package_id: input.package_id,
            connection_status: ConnectionStatus::Pending.as_str().to_string(),
            due_balance: Decimal::ZERO,
            advance_balance: Decimal::ZERO,
            join_date,
            last_payment_date: None,
            created_utc: now,
            updated_utc: now,
        };
        self.state.lock().await.customers.push(customer.clone());
        Ok(customer)
    }

    async fn get_customer(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .customers
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.customer_id == customer_id)
            .cloned())
    }

    async fn list_customers(
        &self,
        tenant_id: Uuid,
        filter: &ListCustomersFilter,
    ) -> Result<Vec<Customer>, AppError> {
        let state = self.state.lock().await;
        let rows = state
            .customers
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| filter.status.map_or(true, |s| c.status() == s))
            .filter(|c| filter.package_id.map_or(true, |p| c.package_id == Some(p)))
            .cloned()
            .collect();
        Ok(page(rows, filter.page_size, filter.page_token, |c: &Customer| {
            c.customer_id
        }))
    }

    async fn update_customer_status(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        status: ConnectionStatus,
    ) -> Result<Option<Customer>, AppError> {
        let mut state = self.state.lock().await;
        Ok(state.customer_mut(tenant_id, customer_id).map(|customer| {
            customer.connection_status = status.as_str().to_string();
            customer.updated_utc = Utc::now();
            customer.clone()
        }))
    }

    async fn find_billable_customers(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<BillableCustomer>, AppError> {
        let state = self.state.lock().await;
        let mut customers: Vec<&Customer> = state
            .customers
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.status() == ConnectionStatus::Active)
            .collect();
        customers.sort_by(|a, b| {
            a.join_date
                .cmp(&b.join_date)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });

        Ok(customers
            .into_iter()
            .filter_map(|c| {
                let package_id = c.package_id?;
                state
                    .packages
                    .iter()
                    .find(|p| p.tenant_id == tenant_id && p.package_id == package_id)
                    .map(|p| BillableCustomer {
                        customer_id: c.customer_id,
                        package_id,
                        monthly_price: p.monthly_price,
                    })
            })
            .collect())
    }

    async fn recompute_customer_balances(
        &self,
        tenant_id: Uuid,
        customer_ids: &[Uuid],
    ) -> Result<(), AppError> {
        self.state.lock().await.recompute(tenant_id, customer_ids);
        Ok(())
    }

    async fn list_suspension_candidates(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<SuspensionCandidate>, AppError> {
        let state = self.state.lock().await;
        let mut candidates: Vec<SuspensionCandidate> = state
            .customers
            .iter()
            .filter(|c| {
                c.tenant_id == tenant_id
                    && matches!(
                        c.status(),
                        ConnectionStatus::Active | ConnectionStatus::Suspended
                    )
            })
            .map(|c| SuspensionCandidate {
                customer_id: c.customer_id,
                connection_status: c.connection_status.clone(),
                due_balance: c.due_balance,
                earliest_unpaid_due_date: state
                    .bills
                    .iter()
                    .filter(|b| {
                        b.tenant_id == tenant_id
                            && b.customer_id == c.customer_id
                            && b.bill_status().is_unpaid()
                    })
                    .map(|b| b.due_date)
                    .min(),
            })
            .collect();
        candidates.sort_by_key(|c| c.customer_id);
        Ok(candidates)
    }

    async fn insert_bill_batch(
        &self,
        tenant_id: Uuid,
        batch: &NewBillBatch,
    ) -> Result<Vec<Bill>, AppError> {
        if batch.drafts.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.state.lock().await;
        let counter = state
            .sequences
            .entry((tenant_id, batch.invoice_year))
            .or_insert(0);
        let first_sequence = *counter + 1;
        *counter += batch.drafts.len() as i64;

        let now = Utc::now();
        let bills: Vec<Bill> = batch
            .drafts
            .iter()
            .enumerate()
            .map(|(offset, draft)| Bill {
                bill_id: Uuid::new_v4(),
                tenant_id,
                customer_id: draft.customer_id,
                amount: draft.amount,
                billing_period_start: batch.billing_period_start,
                billing_period_end: batch.billing_period_end,
                due_date: batch.due_date,
                status: BillStatus::Due.as_str().to_string(),
                invoice_number: format_invoice_number(
                    batch.invoice_year,
                    first_sequence + offset as i64,
                ),
                notes: batch.notes.clone(),
                created_utc: now,
                updated_utc: now,
            })
            .collect();

        state.bills.extend(bills.iter().cloned());
        let customer_ids: Vec<Uuid> = batch.drafts.iter().map(|d| d.customer_id).collect();
        state.recompute(tenant_id, &customer_ids);

        Ok(bills)
    }

    async fn get_bill(&self, tenant_id: Uuid, bill_id: Uuid) -> Result<Option<Bill>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .bills
            .iter()
            .find(|b| b.tenant_id == tenant_id && b.bill_id == bill_id)
            .cloned())
    }

    async fn list_bills(
        &self,
        tenant_id: Uuid,
        filter: &ListBillsFilter,
    ) -> Result<Vec<Bill>, AppError> {
        let state = self.state.lock().await;
        let rows = state
            .bills
            .iter()
            .filter(|b| b.tenant_id == tenant_id)
            .filter(|b| filter.customer_id.map_or(true, |c| b.customer_id == c))
            .filter(|b| filter.status.map_or(true, |s| b.bill_status() == s))
            .filter(|b| filter.due_date.map_or(true, |d| b.due_date == d))
            .cloned()
            .collect();
        Ok(page(rows, filter.page_size, filter.page_token, |b: &Bill| {
            b.bill_id
        }))
    }

    async fn find_unpaid_bills_due_on(
        &self,
        tenant_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Vec<Bill>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .bills
            .iter()
            .filter(|b| {
                b.tenant_id == tenant_id && b.due_date == due_date && b.bill_status().is_unpaid()
            })
            .cloned()
            .collect())
    }

    async fn mark_overdue_bills(
        &self,
        tenant_id: Uuid,
        today: NaiveDate,
    ) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut changed = 0;
        for bill in state.bills.iter_mut().filter(|b| {
            b.tenant_id == tenant_id
                && b.due_date < today
                && matches!(b.bill_status(), BillStatus::Due | BillStatus::Partial)
        }) {
            bill.status = BillStatus::Overdue.as_str().to_string();
            bill.updated_utc = now;
            changed += 1;
        }
        Ok(changed)
    }

    async fn apply_payment(
        &self,
        tenant_id: Uuid,
        input: &RecordPayment,
        today: NaiveDate,
    ) -> Result<AppliedPayment, AppError> {
        let mut state = self.state.lock().await;

        if state.customer_mut(tenant_id, input.customer_id).is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Customer {} not found",
                input.customer_id
            )));
        }

        let bill_index = match input.bill_id {
            Some(bill_id) => {
                let index = state
                    .bills
                    .iter()
                    .position(|b| b.tenant_id == tenant_id && b.bill_id == bill_id)
                    .ok_or_else(|| {
                        AppError::NotFound(anyhow::anyhow!("Bill {} not found", bill_id))
                    })?;
                if state.bills[index].customer_id != input.customer_id {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Bill {} does not belong to customer {}",
                        bill_id,
                        input.customer_id
                    )));
                }
                Some(index)
            }
            None => None,
        };

        let now = Utc::now();
        let payment = Payment {
            payment_id: Uuid::new_v4(),
            tenant_id,
            customer_id: input.customer_id,
            bill_id: input.bill_id,
            amount: input.amount,
            method: input.method.as_str().to_string(),
            reference: input.reference.clone(),
            notes: input.notes.clone(),
            recorded_by: input.recorded_by.clone(),
            created_utc: now,
        };
        state.payments.push(payment.clone());

        let bill = match bill_index {
            Some(index) => {
                let total_paid = state.paid_on_bill(tenant_id, state.bills[index].bill_id);
                let bill = &mut state.bills[index];
                bill.status = BillStatus::from_payments(bill.amount, total_paid)
                    .as_str()
                    .to_string();
                bill.updated_utc = now;
                Some(bill.clone())
            }
            None => None,
        };

        state.recompute(tenant_id, &[input.customer_id]);
        let customer = state
            .customer_mut(tenant_id, input.customer_id)
            .map(|customer| {
                customer.last_payment_date = Some(today);
                customer.updated_utc = now;
                customer.clone()
            })
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Customer {} not found", input.customer_id))
            })?;

        Ok(AppliedPayment {
            payment,
            bill,
            customer,
        })
    }

    async fn list_payments(
        &self,
        tenant_id: Uuid,
        filter: &ListPaymentsFilter,
    ) -> Result<Vec<Payment>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .filter(|p| filter.customer_id.map_or(true, |c| p.customer_id == c))
            .filter(|p| filter.bill_id.map_or(true, |b| p.bill_id == Some(b)))
            .filter(|p| filter.from.map_or(true, |d| p.created_utc.date_naive() >= d))
            .filter(|p| filter.to.map_or(true, |d| p.created_utc.date_naive() <= d))
            .cloned()
            .collect())
    }

    async fn insert_notification_if_absent(
        &self,
        tenant_id: Uuid,
        notification: &NewNotification,
    ) -> Result<Option<NotificationLog>, AppError> {
        let mut state = self.state.lock().await;
        let exists = state.notifications.iter().any(|n| {
            n.tenant_id == tenant_id
                && n.customer_id == notification.customer_id
                && n.notification_type == notification.notification_type
                && n.dedup_day == notification.dedup_day
        });
        if exists {
            return Ok(None);
        }

        let log = NotificationLog {
            notification_id: Uuid::new_v4(),
            tenant_id,
            customer_id: notification.customer_id,
            notification_type: notification.notification_type.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            data: notification.data.clone(),
            status: NotificationStatus::Pending.as_str().to_string(),
            dedup_day: notification.dedup_day,
            created_utc: Utc::now(),
            sent_utc: None,
        };
        state.notifications.push(log.clone());
        Ok(Some(log))
    }

    async fn update_notification_status(
        &self,
        tenant_id: Uuid,
        notification_id: Uuid,
        status: NotificationStatus,
        sent_utc: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if let Some(log) = state
            .notifications
            .iter_mut()
            .find(|n| n.tenant_id == tenant_id && n.notification_id == notification_id)
        {
            log.status = status.as_str().to_string();
            if sent_utc.is_some() {
                log.sent_utc = sent_utc;
            }
        }
        Ok(())
    }

    async fn list_notifications(
        &self,
        tenant_id: Uuid,
        filter: &ListNotificationsFilter,
    ) -> Result<Vec<NotificationLog>, AppError> {
        let state = self.state.lock().await;
        let mut logs: Vec<NotificationLog> = state
            .notifications
            .iter()
            .filter(|n| n.tenant_id == tenant_id)
            .filter(|n| filter.customer_id.map_or(true, |c| n.customer_id == c))
            .filter(|n| filter.status.map_or(true, |s| n.notification_status() == s))
            .filter(|n| filter.day.map_or(true, |d| n.dedup_day == d))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(logs)
    }

    async fn create_push_subscription(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        input: &CreatePushSubscription,
    ) -> Result<PushSubscription, AppError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.subscriptions.iter_mut().find(|s| {
            s.tenant_id == tenant_id && s.customer_id == customer_id && s.endpoint == input.endpoint
        }) {
            existing.p256dh = input.p256dh.clone();
            existing.auth = input.auth.clone();
            existing.is_active = true;
            return Ok(existing.clone());
        }

        let subscription = PushSubscription {
            subscription_id: Uuid::new_v4(),
            tenant_id,
            customer_id,
            endpoint: input.endpoint.clone(),
            p256dh: input.p256dh.clone(),
            auth: input.auth.clone(),
            is_active: true,
            created_utc: Utc::now(),
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn deactivate_push_subscription(
        &self,
        tenant_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state
            .subscriptions
            .iter_mut()
            .find(|s| s.tenant_id == tenant_id && s.subscription_id == subscription_id)
        {
            Some(subscription) => {
                subscription.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_active_push_subscriptions(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Vec<PushSubscription>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.customer_id == customer_id && s.is_active)
            .cloned()
            .collect())
    }

    async fn due_summary(&self, tenant_id: Uuid) -> Result<DueSummary, AppError> {
        let state = self.state.lock().await;

        let mut counts = BillStatusCounts::default();
        for bill in state.bills.iter().filter(|b| b.tenant_id == tenant_id) {
            counts.add(bill.bill_status(), 1);
        }

        let customers: Vec<&Customer> = state
            .customers
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .collect();
        let total_due: Decimal = customers.iter().map(|c| c.due_balance).sum();
        let total_advance: Decimal = customers.iter().map(|c| c.advance_balance).sum();

        let mut top: Vec<TopDueCustomer> = customers
            .iter()
            .filter(|c| c.due_balance > Decimal::ZERO)
            .map(|c| TopDueCustomer {
                customer_id: c.customer_id,
                name: c.name.clone(),
                phone: c.phone.clone(),
                due_balance: c.due_balance,
            })
            .collect();
        let customers_with_due = top.len() as i64;
        top.sort_by(|a, b| {
            b.due_balance
                .cmp(&a.due_balance)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });
        top.truncate(TOP_DUE_LIMIT);

        Ok(DueSummary::new(
            counts,
            total_due,
            total_advance,
            customers_with_due,
            top,
        ))
    }

    async fn collection_summary(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CollectionSummary, AppError> {
        let state = self.state.lock().await;
        let mut by_method: BTreeMap<String, MethodTotal> = BTreeMap::new();
        for payment in state.payments.iter().filter(|p| {
            let day = p.created_utc.date_naive();
            p.tenant_id == tenant_id && day >= from && day <= to
        }) {
            let entry = by_method
                .entry(payment.method.clone())
                .or_insert_with(|| MethodTotal {
                    method: payment.method.clone(),
                    payment_count: 0,
                    total: Decimal::ZERO,
                });
            entry.payment_count += 1;
            entry.total += payment.amount;
        }

        Ok(CollectionSummary::from_method_totals(
            from,
            to,
            by_method.into_values().collect(),
        ))
    }

    async fn monthly_billed(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MonthAmount>, AppError> {
        let state = self.state.lock().await;
        Ok(by_month(state.bills.iter().filter_map(|b| {
            let day = b.billing_period_start;
            (b.tenant_id == tenant_id && day >= from && day <= to).then_some((day, b.amount))
        })))
    }

    async fn monthly_collected(
        &self,
        tenant_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MonthAmount>, AppError> {
        let state = self.state.lock().await;
        Ok(by_month(state.payments.iter().filter_map(|p| {
            let day = p.created_utc.date_naive();
            (p.tenant_id == tenant_id && day >= from && day <= to).then_some((day, p.amount))
        })))
    }

    async fn package_distribution(&self, tenant_id: Uuid) -> Result<Vec<PackageShare>, AppError> {
        let state = self.state.lock().await;
        let mut shares: BTreeMap<Option<Uuid>, PackageShare> = BTreeMap::new();
        for customer in state.customers.iter().filter(|c| c.tenant_id == tenant_id) {
            let package = customer.package_id.and_then(|id| {
                state
                    .packages
                    .iter()
                    .find(|p| p.tenant_id == tenant_id && p.package_id == id)
            });
            let share = shares
                .entry(customer.package_id)
                .or_insert_with(|| PackageShare {
                    package_id: customer.package_id,
                    name: package.map(|p| p.name.clone()),
                    speed_label: package.map(|p| p.speed_label.clone()),
                    monthly_price: package.map(|p| p.monthly_price),
                    customer_count: 0,
                    active_customers: 0,
                    monthly_revenue: Decimal::ZERO,
                });
            share.customer_count += 1;
            if customer.status() == ConnectionStatus::Active {
                share.active_customers += 1;
                share.monthly_revenue += share.monthly_price.unwrap_or_default();
            }
        }
        Ok(shares.into_values().collect())
    }
}

fn by_month(amounts: impl Iterator<Item = (NaiveDate, Decimal)>) -> Vec<MonthAmount> {
    let mut totals: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for (day, amount) in amounts {
        *totals.entry(month_start(day)).or_default() += amount;
    }
    totals
        .into_iter()
        .map(|(month, total)| MonthAmount { month, total })
        .collect()
}
