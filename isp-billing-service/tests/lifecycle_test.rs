//! Daily lifecycle runner tests for isp-billing-service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{date, generation, other_tenant_id, seed_active_customer, tenant_id};
use isp_billing_service::billing::generate_bills;
use isp_billing_service::config::JobsConfig;
use isp_billing_service::models::{BillStatus, ConnectionStatus, ListBillsFilter, TenantSettings};
use isp_billing_service::services::{BillingStore, InMemoryStore, MockPushSender};
use isp_billing_service::workers::LifecycleJobRunner;

fn runner(store: Arc<InMemoryStore>, push: Arc<MockPushSender>, enabled: bool) -> LifecycleJobRunner {
    LifecycleJobRunner::new(
        JobsConfig {
            enabled,
            interval: Duration::from_secs(3600),
        },
        store,
        push,
        Duration::from_millis(200),
    )
}

#[tokio::test]
async fn run_once_sweeps_every_tenant() {
    let store = Arc::new(InMemoryStore::new());
    let push = Arc::new(MockPushSender::new());

    let mut strict = TenantSettings::defaults(tenant_id());
    strict.auto_suspend_days = 5;
    store.upsert_tenant_settings(&strict).await.unwrap();

    let (_, late) = seed_active_customer(store.as_ref(), tenant_id(), "1000", "Late").await;
    generate_bills(
        store.as_ref(),
        tenant_id(),
        &generation("2024-01-01", "2024-01-31", "2024-02-05"),
        date("2024-01-31"),
    )
    .await
    .unwrap();

    // Second tenant: bill due in three days, automation off.
    let (_, upcoming) =
        seed_active_customer(store.as_ref(), other_tenant_id(), "700", "Upcoming").await;
    generate_bills(
        store.as_ref(),
        other_tenant_id(),
        &generation("2024-02-01", "2024-02-29", "2024-02-13"),
        date("2024-02-01"),
    )
    .await
    .unwrap();

    let summary = runner(store.clone(), push, false)
        .run_once(date("2024-02-10"))
        .await;

    assert_eq!(summary.tenants, 2);
    assert_eq!(summary.bills_marked_overdue, 1);
    assert_eq!(summary.customers_suspended, 1);
    assert_eq!(summary.reminders_sent, 1);
    assert_eq!(summary.failures, 0);

    let late = store
        .get_customer(tenant_id(), late.customer_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(late.status(), ConnectionStatus::Suspended);

    let overdue = store
        .list_bills(
            tenant_id(),
            &ListBillsFilter {
                status: Some(BillStatus::Overdue),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(overdue.len(), 1);

    let upcoming = store
        .get_customer(other_tenant_id(), upcoming.customer_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(upcoming.status(), ConnectionStatus::Active);
}

#[tokio::test]
async fn disabled_runner_does_not_start() {
    let store = Arc::new(InMemoryStore::new());
    let push = Arc::new(MockPushSender::new());

    assert!(runner(store, push, false).start().is_none());
}

#[tokio::test]
async fn enabled_runner_stops_on_cancel() {
    let store = Arc::new(InMemoryStore::new());
    let push = Arc::new(MockPushSender::new());
    let runner = runner(store, push, true);
    let token = runner.shutdown_token();

    let handle = runner.start().expect("runner should start when enabled");
    token.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("runner did not stop")
        .unwrap();
}
