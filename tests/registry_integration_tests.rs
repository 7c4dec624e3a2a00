//! Contacts, categories and recurring rules over HTTP.

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{TestApp, number};

fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn contacts_are_filtered_by_kind_and_protected_while_referenced() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (status, supplier) = app
        .send(
            Method::POST,
            "/contacts",
            Some(json!({ "name": "  Paper Co  ", "kind": "supplier", "email": "sales@paper.test" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{supplier}");
    assert_eq!(supplier["name"], "Paper Co");

    let (status, _) = app
        .send(
            Method::POST,
            "/contacts",
            Some(json!({ "name": "Jane", "kind": "customer" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, suppliers) = app
        .send(Method::GET, "/contacts?kind=supplier", None)
        .await?;
    assert_eq!(suppliers.as_array().map(Vec::len), Some(1));

    let (status, _) = app
        .send(
            Method::POST,
            "/payables",
            Some(json!({
                "description": "Paper",
                "amount": 40.0,
                "due_date": "2025-05-01",
                "contact_id": supplier["id"],
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = app
        .send(Method::DELETE, &format!("/contacts/{}", id_of(&supplier)), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "contact_in_use");
    Ok(())
}

#[tokio::test]
async fn malformed_contact_email_is_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (status, error) = app
        .send(
            Method::POST,
            "/contacts",
            Some(json!({ "name": "Bad", "kind": "both", "email": "nobody" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "validation_failed");
    Ok(())
}

#[tokio::test]
async fn category_with_children_cannot_be_deleted() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (status, parent) = app
        .send(
            Method::POST,
            "/categories",
            Some(json!({ "name": "Operations", "kind": "expense" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, child) = app
        .send(
            Method::POST,
            "/categories",
            Some(json!({ "name": "Utilities", "kind": "expense", "parent_id": parent["id"] })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{child}");

    let (status, error) = app
        .send(Method::DELETE, &format!("/categories/{}", id_of(&parent)), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "category_has_children");

    let (status, _) = app
        .send(Method::DELETE, &format!("/categories/{}", id_of(&child)), None)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .send(Method::DELETE, &format!("/categories/{}", id_of(&parent)), None)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn recurring_generation_is_incremental() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (status, rule) = app
        .send(
            Method::POST,
            "/recurring",
            Some(json!({
                "kind": "payable",
                "description": "Office rent",
                "amount": 1500.0,
                "frequency": "monthly",
                "start_date": "2025-01-31",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{rule}");
    assert_eq!(rule["is_active"], true);
    let generate = format!("/recurring/{}/generate", id_of(&rule));

    let (status, first) = app
        .send(Method::POST, &generate, Some(json!({ "until": "2025-03-31" })))
        .await?;
    assert_eq!(status, StatusCode::OK, "{first}");
    let dues: Vec<&str> = first["generated"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["due_date"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(dues, vec!["2025-01-31", "2025-02-28", "2025-03-31"]);
    assert_eq!(first["rule"]["last_generated_date"], "2025-03-31");
    assert_eq!(number(&first["generated"][0], "amount"), 1500.0);
    assert_eq!(first["generated"][0]["recurring_rule_id"], rule["id"]);

    let (_, repeat) = app
        .send(Method::POST, &generate, Some(json!({ "until": "2025-03-31" })))
        .await?;
    assert_eq!(repeat["generated"].as_array().map(Vec::len), Some(0));

    let (_, next) = app
        .send(Method::POST, &generate, Some(json!({ "until": "2025-04-30" })))
        .await?;
    assert_eq!(next["generated"][0]["due_date"], "2025-04-30");

    let (_, payables) = app.send(Method::GET, "/payables", None).await?;
    assert_eq!(payables.as_array().map(Vec::len), Some(4));
    Ok(())
}

#[tokio::test]
async fn inactive_rule_does_not_generate() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (_, rule) = app
        .send(
            Method::POST,
            "/recurring",
            Some(json!({
                "kind": "receivable",
                "description": "Retainer",
                "amount": 800.0,
                "frequency": "weekly",
                "start_date": "2025-01-06",
                "is_active": false,
            })),
        )
        .await?;
    let (status, error) = app
        .send(
            Method::POST,
            &format!("/recurring/{}/generate", id_of(&rule)),
            Some(json!({ "until": "2025-02-01" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "rule_inactive");
    Ok(())
}
