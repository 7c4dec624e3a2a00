//! Banks, payables and receivables over HTTP.

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{TestApp, number};

async fn create_bank(app: &TestApp, initial: f64, overdraft: f64) -> Result<Value> {
    let (status, bank) = app
        .send(
            Method::POST,
            "/banks",
            Some(json!({
                "name": "Operating",
                "bank_code": "341",
                "initial_balance": initial,
                "overdraft_limit": overdraft,
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{bank}");
    Ok(bank)
}

async fn create_entry(app: &TestApp, resource: &str, body: Value) -> Result<Vec<Value>> {
    let (status, created) = app
        .send(Method::POST, &format!("/{resource}"), Some(body))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    Ok(created.as_array().cloned().unwrap_or_default())
}

#[tokio::test]
async fn paying_a_payable_applies_interest_and_discount() -> Result<()> {
    let app = TestApp::spawn().await?;
    let bank = create_bank(&app, 1000.0, 0.0).await?;
    assert_eq!(number(&bank, "current_balance"), 1000.0);

    let entries = create_entry(
        &app,
        "payables",
        json!({
            "description": "Supplier invoice",
            "amount": 200.0,
            "due_date": "2025-03-10",
            "bank_account_id": bank["id"],
        }),
    )
    .await?;
    let payable = &entries[0];
    assert_eq!(payable["is_paid"], false);

    let (status, settled) = app
        .send(
            Method::POST,
            &format!("/payables/{}/pay", payable["id"].as_str().unwrap_or_default()),
            Some(json!({ "paid_date": "2025-03-12", "interest": 10.5, "discount": 0.5 })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{settled}");
    assert_eq!(settled["entry"]["is_paid"], true);
    assert_eq!(settled["entry"]["status"], "paid");
    assert_eq!(number(&settled["entry"], "paid_amount"), 210.0);
    assert_eq!(settled["entry"]["paid_date"], "2025-03-12");
    assert_eq!(number(&settled["bank_account"], "current_balance"), 790.0);

    let (status, history) = app
        .send(
            Method::GET,
            &format!("/banks/{}/history", bank["id"].as_str().unwrap_or_default()),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let movements = history.as_array().cloned().unwrap_or_default();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0]["kind"], "payable_payment");
    assert_eq!(number(&movements[0], "amount"), -210.0);
    assert_eq!(number(&movements[0], "balance_after"), 790.0);
    Ok(())
}

#[tokio::test]
async fn payment_beyond_balance_and_overdraft_is_rejected_with_shortfall() -> Result<()> {
    let app = TestApp::spawn().await?;
    let bank = create_bank(&app, 100.0, 50.0).await?;
    assert_eq!(number(&bank, "available_balance"), 150.0);

    let entries = create_entry(
        &app,
        "payables",
        json!({ "description": "Rent", "amount": 180.0, "due_date": "2025-03-01" }),
    )
    .await?;
    let id = entries[0]["id"].as_str().unwrap_or_default().to_string();

    let (status, error) = app
        .send(
            Method::POST,
            &format!("/payables/{id}/pay"),
            Some(json!({ "bank_account_id": bank["id"] })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "insufficient_balance");
    assert_eq!(number(&error["details"], "shortfall"), 30.0);
    assert_eq!(number(&error["details"], "available"), 150.0);

    let (_, bank_after) = app
        .send(
            Method::GET,
            &format!("/banks/{}", bank["id"].as_str().unwrap_or_default()),
            None,
        )
        .await?;
    assert_eq!(number(&bank_after, "current_balance"), 100.0);

    let (_, entry) = app.send(Method::GET, &format!("/payables/{id}"), None).await?;
    assert_eq!(entry["is_paid"], false);
    Ok(())
}

#[tokio::test]
async fn oversized_amounts_are_rejected_and_the_ceiling_still_settles() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (status, error) = app
        .send(
            Method::POST,
            "/banks",
            Some(json!({
                "name": "Huge",
                "initial_balance": 5e16,
                "overdraft_limit": 5e16,
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{error}");
    assert_eq!(error["code"], "validation_failed");

    let bank = create_bank(&app, 1e12, 1e12).await?;
    let entries = create_entry(
        &app,
        "payables",
        json!({
            "description": "Tiny",
            "amount": 1.0,
            "due_date": "2025-03-10",
            "bank_account_id": bank["id"],
        }),
    )
    .await?;
    let (status, settled) = app
        .send(
            Method::POST,
            &format!("/payables/{}/pay", entries[0]["id"].as_str().unwrap_or_default()),
            Some(json!({ "interest": 1e12 })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{settled}");
    assert_eq!(number(&settled["entry"], "paid_amount"), 1e12 + 1.0);
    assert_eq!(number(&settled["bank_account"], "current_balance"), -1.0);
    Ok(())
}

#[tokio::test]
async fn receiving_then_reversing_restores_the_balance() -> Result<()> {
    let app = TestApp::spawn().await?;
    let bank = create_bank(&app, 50.0, 0.0).await?;
    let bank_id = bank["id"].as_str().unwrap_or_default().to_string();

    let entries = create_entry(
        &app,
        "receivables",
        json!({
            "description": "Invoice 42",
            "amount": 300.0,
            "due_date": "2025-04-01",
            "bank_account_id": bank_id,
        }),
    )
    .await?;
    let id = entries[0]["id"].as_str().unwrap_or_default().to_string();

    let (status, received) = app
        .send(
            Method::POST,
            &format!("/receivables/{id}/receive"),
            Some(json!({ "interest": 12.0 })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{received}");
    assert_eq!(number(&received["bank_account"], "current_balance"), 362.0);

    let (status, again) = app
        .send(Method::POST, &format!("/receivables/{id}/receive"), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["code"], "already_paid");

    let (status, reversed) = app
        .send(Method::POST, &format!("/receivables/{id}/reverse"), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{reversed}");
    assert_eq!(reversed["entry"]["is_paid"], false);
    assert_eq!(number(&reversed["entry"], "interest"), 0.0);
    assert!(reversed["entry"]["paid_date"].is_null());
    assert_eq!(number(&reversed["bank_account"], "current_balance"), 50.0);

    let (_, history) = app
        .send(Method::GET, &format!("/banks/{bank_id}/history"), None)
        .await?;
    let kinds: Vec<&str> = history
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["kind"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&"receivable_receipt"));
    assert!(kinds.contains(&"receivable_reversal"));

    let (status, error) = app
        .send(Method::POST, &format!("/receivables/{id}/reverse"), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "not_paid");
    Ok(())
}

#[tokio::test]
async fn installments_split_the_total_and_step_monthly() -> Result<()> {
    let app = TestApp::spawn().await?;
    let entries = create_entry(
        &app,
        "payables",
        json!({
            "description": "Equipment",
            "amount": 100.0,
            "due_date": "2025-01-31",
            "installments": 3,
        }),
    )
    .await?;
    assert_eq!(entries.len(), 3);

    let amounts: Vec<f64> = entries.iter().map(|e| number(e, "amount")).collect();
    assert_eq!(amounts, vec![33.33, 33.33, 33.34]);
    let dues: Vec<&str> = entries
        .iter()
        .filter_map(|e| e["due_date"].as_str())
        .collect();
    assert_eq!(dues, vec!["2025-01-31", "2025-02-28", "2025-03-31"]);

    let group = &entries[0]["installment_group_id"];
    assert!(!group.is_null());
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(&entry["installment_group_id"], group);
        assert_eq!(entry["installment_number"], json!(index + 1));
        assert_eq!(entry["installment_total"], 3);
    }
    Ok(())
}

#[tokio::test]
async fn paid_entries_cannot_be_edited_or_deleted() -> Result<()> {
    let app = TestApp::spawn().await?;
    let entries = create_entry(
        &app,
        "payables",
        json!({ "description": "Tax", "amount": 10.0, "due_date": "2025-02-01" }),
    )
    .await?;
    let id = entries[0]["id"].as_str().unwrap_or_default().to_string();

    let (status, _) = app
        .send(Method::POST, &format!("/payables/{id}/pay"), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = app
        .send(
            Method::PATCH,
            &format!("/payables/{id}"),
            Some(json!({ "description": "Changed" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "already_paid");

    let (status, _) = app
        .send(Method::DELETE, &format!("/payables/{id}"), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn payables_and_receivables_do_not_cross() -> Result<()> {
    let app = TestApp::spawn().await?;
    let entries = create_entry(
        &app,
        "payables",
        json!({ "description": "Fuel", "amount": 80.0, "due_date": "2025-02-01" }),
    )
    .await?;
    let id = entries[0]["id"].as_str().unwrap_or_default().to_string();

    let (status, _) = app
        .send(Method::GET, &format!("/receivables/{id}"), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, receivables) = app.send(Method::GET, "/receivables", None).await?;
    assert_eq!(receivables.as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn rows_of_another_company_are_forbidden() -> Result<()> {
    let app = TestApp::spawn().await?;
    let bank = create_bank(&app, 10.0, 0.0).await?;
    let bank_id = bank["id"].as_str().unwrap_or_default().to_string();
    let intruder = app.other_tenant().await?;

    let (status, error) = app
        .send_as(&intruder, Method::GET, &format!("/banks/{bank_id}"), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["code"], "forbidden");

    let (_, own) = app.send_as(&intruder, Method::GET, "/banks", None).await?;
    assert_eq!(own.as_array().map(Vec::len), Some(0));

    let (status, _) = app
        .send_as(
            &intruder,
            Method::POST,
            "/payables",
            Some(json!({
                "description": "Sneaky",
                "amount": 1.0,
                "due_date": "2025-01-01",
                "bank_account_id": bank_id,
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() -> Result<()> {
    let app = TestApp::spawn().await?;
    let request = axum::http::Request::builder()
        .uri("/banks")
        .body(axum::body::Body::empty())?;
    let response = app.raw(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
