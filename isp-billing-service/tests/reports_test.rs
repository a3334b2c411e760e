//! Dashboard report, settings and notification API tests for isp-billing-service.

mod common;

use axum::http::{Method, StatusCode};
use common::{dec, money, TestHarness, OTHER_TENANT_ID};
use serde_json::json;

#[tokio::test]
async fn due_summary_reports_balances_and_top_debtors() {
    let harness = TestHarness::new();
    let cheap = harness.create_package("500").await;
    let pricey = harness.create_package("1500").await;
    let small = harness.create_active_customer(&cheap, "Small").await;
    let big = harness.create_active_customer(&pricey, "Big").await;
    let generated = harness.generate_january_bills().await;

    let small_bill = generated["bills"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["customer_id"] == small.as_str())
        .unwrap()["bill_id"]
        .clone();
    harness
        .send(
            Method::POST,
            "/v1/payments",
            Some(json!({
                "customer_id": small,
                "bill_id": small_bill,
                "amount": "500",
                "method": "cash",
            })),
        )
        .await;

    let (status, summary) = harness
        .send(Method::GET, "/v1/reports/due-summary", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&summary["total_due"]), dec("1500"));
    assert_eq!(summary["customers_with_due"], 1);
    assert_eq!(summary["bills_due"], 1);
    assert_eq!(summary["bills_paid"], 1);
    assert_eq!(money(&summary["paid_percentage"]), dec("50"));
    let top = summary["top_due_customers"].as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["customer_id"], big.as_str());
}

#[tokio::test]
async fn collection_summary_groups_by_method() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("1000").await;
    let customer_id = harness.create_active_customer(&package_id, "Collector").await;
    harness.generate_january_bills().await;

    for (amount, method) in [("300", "cash"), ("200", "cash"), ("500", "bkash")] {
        let (status, _) = harness
            .send(
                Method::POST,
                "/v1/payments",
                Some(json!({ "customer_id": customer_id, "amount": amount, "method": method })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let today = chrono::Utc::now().date_naive();
    let (status, summary) = harness
        .send(
            Method::GET,
            &format!("/v1/reports/collections?from={}&to={}", today, today),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&summary["total_collected"]), dec("1000"));
    assert_eq!(summary["payment_count"], 3);
    let by_method = summary["by_method"].as_array().unwrap();
    assert_eq!(by_method.len(), 2);
    assert_eq!(by_method[0]["method"], "bkash");
    assert_eq!(money(&by_method[1]["total"]), dec("500"));
}

#[tokio::test]
async fn collection_summary_rejects_inverted_range() {
    let harness = TestHarness::new();

    let (status, _) = harness
        .send(
            Method::GET,
            "/v1/reports/collections?from=2024-03-01&to=2024-02-01",
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_are_patched_per_tenant() {
    let harness = TestHarness::new();

    let (_, defaults) = harness.send(Method::GET, "/v1/settings", None).await;
    assert_eq!(defaults["auto_suspend_days"], 0);
    assert_eq!(defaults["currency"], "BDT");

    let (status, updated) = harness
        .send(
            Method::PUT,
            "/v1/settings",
            Some(json!({ "auto_suspend_days": 15, "enable_online_payment": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["auto_suspend_days"], 15);
    assert_eq!(updated["enable_online_payment"], true);
    assert_eq!(updated["currency"], "BDT");

    let (_, other) = harness
        .send_as(Some(OTHER_TENANT_ID), Method::GET, "/v1/settings", None)
        .await;
    assert_eq!(other["auto_suspend_days"], 0);

    let (status, _) = harness
        .send(
            Method::PUT,
            "/v1/settings",
            Some(json!({ "auto_suspend_days": -3 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn reminder_job_route_logs_notifications() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("1000").await;
    let customer_id = harness.create_active_customer(&package_id, "Notified").await;
    harness.generate_january_bills().await;

    let (status, subscription) = harness
        .send(
            Method::POST,
            &format!("/v1/customers/{}/push-subscriptions", customer_id),
            Some(json!({ "endpoint": "https://push.example.com/device-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(subscription["is_active"], true);

    let (status, report) = harness
        .send(
            Method::POST,
            "/v1/jobs/billing-reminders",
            Some(json!({ "today": "2024-02-02" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total_sent"], 1);
    assert_eq!(report["lead_times"][1]["lead_time"], 3);
    assert_eq!(report["lead_times"][1]["sent"], 1);
    assert_eq!(harness.push.delivered().len(), 1);

    let (_, logs) = harness
        .send(
            Method::GET,
            &format!("/v1/notifications?customer_id={}&day=2024-02-02", customer_id),
            None,
        )
        .await;
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["status"], "sent");
    assert_eq!(logs[0]["title"], "Payment due in 3 days");

    let subscription_id = subscription["subscription_id"].as_str().unwrap();
    let (status, deactivated) = harness
        .send(
            Method::DELETE,
            &format!("/v1/push-subscriptions/{}", subscription_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deactivated["is_active"], false);
}

#[tokio::test]
async fn invalid_push_endpoint_is_rejected() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("1000").await;
    let customer_id = harness.create_active_customer(&package_id, "Bad endpoint").await;

    let (status, _) = harness
        .send(
            Method::POST,
            &format!("/v1/customers/{}/push-subscriptions", customer_id),
            Some(json!({ "endpoint": "not a url" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn revenue_report_compares_billed_and_collected_per_month() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("1000").await;
    let customer_id = harness.create_active_customer(&package_id, "Monthly").await;
    harness.generate_january_bills().await;

    let (status, spring) = harness
        .send(
            Method::GET,
            "/v1/reports/revenue?months=3&as_of=2024-03-15",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let months = spring["months"].as_array().unwrap();
    let labels: Vec<&str> = months.iter().map(|m| m["month"].as_str().unwrap()).collect();
    assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03"]);
    assert_eq!(money(&months[0]["billed"]), dec("1000"));
    assert_eq!(money(&months[1]["billed"]), dec("0"));
    assert_eq!(money(&spring["total_collected"]), dec("0"));
    assert_eq!(money(&spring["collection_rate"]), dec("0"));

    harness
        .send(
            Method::POST,
            "/v1/payments",
            Some(json!({ "customer_id": customer_id, "amount": "400", "method": "cash" })),
        )
        .await;

    let (_, recent) = harness.send(Method::GET, "/v1/reports/revenue", None).await;
    let months = recent["months"].as_array().unwrap();
    assert_eq!(months.len(), 6);
    assert_eq!(money(&months[5]["collected"]), dec("400"));
    assert_eq!(money(&recent["total_collected"]), dec("400"));
    assert_eq!(money(&recent["total_billed"]), dec("0"));
}

#[tokio::test]
async fn revenue_report_rejects_out_of_range_month_count() {
    let harness = TestHarness::new();

    for months in ["0", "25"] {
        let (status, _) = harness
            .send(
                Method::GET,
                &format!("/v1/reports/revenue?months={}", months),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn package_distribution_counts_customers_and_revenue() {
    let harness = TestHarness::new();
    let fiber = harness.create_package("1500").await;
    let basic = harness.create_package("500").await;
    harness.create_active_customer(&fiber, "Fiber A").await;
    harness.create_active_customer(&fiber, "Fiber B").await;
    harness.create_active_customer(&basic, "Basic").await;
    for body in [
        json!({ "name": "Waiting", "phone": "01711111111", "package_id": basic }),
        json!({ "name": "No plan", "phone": "01722222222" }),
    ] {
        let (status, _) = harness.send(Method::POST, "/v1/customers", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, distribution) = harness
        .send(Method::GET, "/v1/reports/packages", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(distribution["total_customers"], 5);
    assert_eq!(money(&distribution["expected_monthly_revenue"]), dec("3500"));
    let packages = distribution["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 3);

    assert_eq!(packages[0]["package_id"], fiber.as_str());
    assert_eq!(packages[0]["customer_count"], 2);
    assert_eq!(money(&packages[0]["monthly_revenue"]), dec("3000"));

    assert_eq!(packages[1]["package_id"], basic.as_str());
    assert_eq!(packages[1]["customer_count"], 2);
    assert_eq!(packages[1]["active_customers"], 1);
    assert_eq!(money(&packages[1]["monthly_revenue"]), dec("500"));

    assert!(packages[2]["package_id"].is_null());
    assert_eq!(packages[2]["customer_count"], 1);

    let (_, other) = harness
        .send_as(Some(OTHER_TENANT_ID), Method::GET, "/v1/reports/packages", None)
        .await;
    assert_eq!(other["total_customers"], 0);
}
