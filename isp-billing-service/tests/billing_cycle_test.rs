//! Bill generation and full billing cycle tests for isp-billing-service.

mod common;

use axum::http::{Method, StatusCode};
use common::{dec, money, TestApp, TestHarness, OTHER_TENANT_ID};
use serde_json::json;
use std::collections::HashSet;

#[tokio::test]
async fn monthly_cycle_from_bill_to_paid() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("1000").await;
    let customer_id = harness.create_active_customer(&package_id, "Rahim").await;

    let (_, customer) = harness
        .send(Method::GET, &format!("/v1/customers/{}", customer_id), None)
        .await;
    assert_eq!(money(&customer["due_balance"]), dec("0"));

    let generated = harness.generate_january_bills().await;
    assert_eq!(generated["bill_count"], 1);
    assert_eq!(money(&generated["total_amount"]), dec("1000"));

    let bill = &generated["bills"][0];
    let bill_id = bill["bill_id"].as_str().unwrap().to_string();
    assert_eq!(bill["customer_id"], customer_id.as_str());
    assert_eq!(money(&bill["amount"]), dec("1000"));
    assert_eq!(bill["status"], "due");
    assert_eq!(bill["invoice_number"], "INV-2024-0001");
    assert_eq!(bill["billing_period_start"], "2024-01-01");
    assert_eq!(bill["billing_period_end"], "2024-01-31");
    assert_eq!(bill["due_date"], "2024-02-05");

    let (status, first) = harness
        .send(
            Method::POST,
            "/v1/payments",
            Some(json!({
                "customer_id": customer_id,
                "bill_id": bill_id,
                "amount": "400",
                "method": "cash",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", first);
    assert_eq!(first["bill"]["status"], "partial");
    assert_eq!(money(&first["customer"]["due_balance"]), dec("600"));
    let today = chrono::Utc::now().date_naive().to_string();
    assert_eq!(first["customer"]["last_payment_date"], today.as_str());

    let (status, second) = harness
        .send(
            Method::POST,
            "/v1/payments",
            Some(json!({
                "customer_id": customer_id,
                "bill_id": bill_id,
                "amount": "600",
                "method": "bkash",
                "reference": "TRX-991",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", second);
    assert_eq!(second["bill"]["status"], "paid");
    assert_eq!(money(&second["customer"]["due_balance"]), dec("0"));
    assert_eq!(money(&second["customer"]["advance_balance"]), dec("0"));
    assert_eq!(second["customer"]["last_payment_date"], today.as_str());

    let (_, stored) = harness
        .send(Method::GET, &format!("/v1/bills/{}", bill_id), None)
        .await;
    assert_eq!(stored["status"], "paid");

    let (_, payments) = harness
        .send(
            Method::GET,
            &format!("/v1/payments?bill_id={}", bill_id),
            None,
        )
        .await;
    assert_eq!(payments.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn generation_fails_without_active_customers() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("800").await;
    for name in ["A", "B", "C"] {
        let customer_id = harness.create_active_customer(&package_id, name).await;
        harness
            .send(
                Method::PUT,
                &format!("/v1/customers/{}/status", customer_id),
                Some(json!({ "status": "suspended" })),
            )
            .await;
    }

    let (status, body) = harness
        .send(
            Method::POST,
            "/v1/bills/generate",
            Some(json!({
                "billing_period_start": "2024-01-01",
                "billing_period_end": "2024-01-31",
                "due_date": "2024-02-05",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("No active customers"));

    let (_, bills) = harness.send(Method::GET, "/v1/bills", None).await;
    assert!(bills["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn customers_without_package_or_not_active_are_not_billed() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("700").await;
    let billed = harness.create_active_customer(&package_id, "Billed").await;

    // Pending customer on the same package.
    harness
        .send(
            Method::POST,
            "/v1/customers",
            Some(json!({ "name": "Pending", "phone": "01711111111", "package_id": package_id })),
        )
        .await;

    let generated = harness.generate_january_bills().await;

    assert_eq!(generated["bill_count"], 1);
    assert_eq!(generated["bills"][0]["customer_id"], billed.as_str());
}

#[tokio::test]
async fn invoice_numbers_are_unique_within_and_across_runs() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("600").await;
    for name in ["One", "Two", "Three"] {
        harness.create_active_customer(&package_id, name).await;
    }

    let first = harness.generate_january_bills().await;
    let (status, second) = harness
        .send(
            Method::POST,
            "/v1/bills/generate",
            Some(json!({
                "billing_period_start": "2024-02-01",
                "billing_period_end": "2024-02-29",
                "due_date": "2024-03-05",
                "issue_date": "2024-02-29",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut numbers = HashSet::new();
    for run in [&first, &second] {
        for bill in run["bills"].as_array().unwrap() {
            assert!(numbers.insert(bill["invoice_number"].as_str().unwrap().to_string()));
        }
    }

    assert_eq!(numbers.len(), 6);
    for seq in 1..=6 {
        assert!(numbers.contains(&format!("INV-2024-{:04}", seq)));
    }
}

#[tokio::test]
async fn invoice_sequence_restarts_each_year() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("600").await;
    harness.create_active_customer(&package_id, "Yearly").await;

    harness.generate_january_bills().await;
    let (_, next_year) = harness
        .send(
            Method::POST,
            "/v1/bills/generate",
            Some(json!({
                "billing_period_start": "2025-01-01",
                "billing_period_end": "2025-01-31",
                "due_date": "2025-02-05",
                "issue_date": "2025-01-31",
            })),
        )
        .await;

    assert_eq!(next_year["bills"][0]["invoice_number"], "INV-2025-0001");
}

#[tokio::test]
async fn inverted_period_is_rejected() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("600").await;
    harness.create_active_customer(&package_id, "Inverted").await;

    let (status, _) = harness
        .send(
            Method::POST,
            "/v1/bills/generate",
            Some(json!({
                "billing_period_start": "2024-01-31",
                "billing_period_end": "2024-01-01",
                "due_date": "2024-02-05",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenants_do_not_see_each_others_bills() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("1000").await;
    harness.create_active_customer(&package_id, "Tenant A").await;
    let generated = harness.generate_january_bills().await;
    let bill_id = generated["bills"][0]["bill_id"].as_str().unwrap();

    let (status, _) = harness
        .send_as(
            Some(OTHER_TENANT_ID),
            Method::GET,
            &format!("/v1/bills/{}", bill_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = harness
        .send_as(Some(OTHER_TENANT_ID), Method::GET, "/v1/bills", None)
        .await;
    assert!(listed["items"].as_array().unwrap().is_empty());

    // The other tenant has no billable customers of its own.
    let (status, _) = harness
        .send_as(
            Some(OTHER_TENANT_ID),
            Method::POST,
            "/v1/bills/generate",
            Some(json!({
                "billing_period_start": "2024-01-01",
                "billing_period_end": "2024-01-31",
                "due_date": "2024-02-05",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn bill_listing_filters_and_paginates() {
    let harness = TestHarness::new();
    let package_id = harness.create_package("300").await;
    for name in ["P1", "P2", "P3"] {
        harness.create_active_customer(&package_id, name).await;
    }
    harness.generate_january_bills().await;

    let (_, first_page) = harness
        .send(Method::GET, "/v1/bills?status=due&page_size=2", None)
        .await;
    let items = first_page["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let token = first_page["next_page_token"].as_str().unwrap();

    let (_, second_page) = harness
        .send(
            Method::GET,
            &format!("/v1/bills?status=due&page_size=2&page_token={}", token),
            None,
        )
        .await;
    assert_eq!(second_page["items"].as_array().unwrap().len(), 1);
    assert!(second_page["next_page_token"].is_null());

    let (_, paid) = harness.send(Method::GET, "/v1/bills?status=paid", None).await;
    assert!(paid["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn monthly_cycle_against_postgres() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();
    let tenant = common::TEST_TENANT_ID;

    let package: serde_json::Value = client
        .post(format!("{}/v1/packages", app.address))
        .header("X-Tenant-ID", tenant)
        .json(&json!({ "name": "Home", "speed_label": "20 Mbps", "monthly_price": "1000" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let customer: serde_json::Value = client
        .post(format!("{}/v1/customers", app.address))
        .header("X-Tenant-ID", tenant)
        .json(&json!({
            "name": "Rahim",
            "phone": "01700000000",
            "package_id": package["package_id"],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let customer_id = customer["customer_id"].as_str().unwrap().to_string();

    client
        .put(format!("{}/v1/customers/{}/status", app.address, customer_id))
        .header("X-Tenant-ID", tenant)
        .json(&json!({ "status": "active" }))
        .send()
        .await
        .unwrap();

    let generated: serde_json::Value = client
        .post(format!("{}/v1/bills/generate", app.address))
        .header("X-Tenant-ID", tenant)
        .json(&json!({
            "billing_period_start": "2024-01-01",
            "billing_period_end": "2024-01-31",
            "due_date": "2024-02-05",
            "issue_date": "2024-01-31",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(generated["bills"][0]["invoice_number"], "INV-2024-0001");
    let bill_id = generated["bills"][0]["bill_id"].as_str().unwrap().to_string();

    for (amount, expected) in [("400", "partial"), ("600", "paid")] {
        let outcome: serde_json::Value = client
            .post(format!("{}/v1/payments", app.address))
            .header("X-Tenant-ID", tenant)
            .json(&json!({
                "customer_id": customer_id,
                "bill_id": bill_id,
                "amount": amount,
                "method": "cash",
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(outcome["bill"]["status"], expected);
    }

    app.cleanup().await;
}
