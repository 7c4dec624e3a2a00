//! Products, kits and product images over HTTP.

use anyhow::Result;
use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{TestApp, number, read_json};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

async fn create_product(app: &TestApp, body: Value) -> Result<(StatusCode, Value)> {
    app.send(Method::POST, "/products", Some(body)).await
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn kit_is_created_with_its_components() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (status, _) = create_product(
        &app,
        json!({ "sku": "MUG-01", "name": "Mug", "sale_price": 25.0, "cost_price": 9.9 }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, kit) = create_product(
        &app,
        json!({
            "sku": "KIT-MUGS",
            "name": "Two mugs",
            "kind": "kit",
            "sale_price": 45.0,
            "components": [{ "sku": "MUG-01", "quantity": 2 }],
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{kit}");
    assert_eq!(kit["kind"], "kit");
    assert_eq!(kit["components"][0]["sku"], "MUG-01");
    assert_eq!(kit["components"][0]["quantity"], 2);
    assert_eq!(number(&kit, "sale_price"), 45.0);

    let (status, error) = create_product(
        &app,
        json!({
            "sku": "KIT-GHOST",
            "name": "Missing parts",
            "kind": "kit",
            "sale_price": 10.0,
            "components": [{ "sku": "NOPE", "quantity": 1 }],
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "validation_failed");
    Ok(())
}

#[tokio::test]
async fn duplicate_live_sku_conflicts() -> Result<()> {
    let app = TestApp::spawn().await?;
    let body = json!({ "sku": "TEE-M", "name": "T-shirt", "sale_price": 59.9 });
    let (status, _) = create_product(&app, body.clone()).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = create_product(&app, body).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "conflict");
    Ok(())
}

#[tokio::test]
async fn deletion_requires_zero_stock_and_no_parent_kit() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (_, stocked) = create_product(
        &app,
        json!({ "sku": "CUP-01", "name": "Cup", "sale_price": 12.0, "stock": 4 }),
    )
    .await?;
    let (status, error) = app
        .send(Method::DELETE, &format!("/products/{}", id_of(&stocked)), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "product_has_stock");

    let (_, part) = create_product(
        &app,
        json!({ "sku": "LID-01", "name": "Lid", "sale_price": 3.0 }),
    )
    .await?;
    let (status, _) = create_product(
        &app,
        json!({
            "sku": "KIT-LID",
            "name": "Lid kit",
            "kind": "kit",
            "sale_price": 5.0,
            "components": [{ "sku": "LID-01", "quantity": 1 }],
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = app
        .send(Method::DELETE, &format!("/products/{}", id_of(&part)), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "product_is_component");
    Ok(())
}

#[tokio::test]
async fn deleted_sku_can_be_reused() -> Result<()> {
    let app = TestApp::spawn().await?;
    let body = json!({ "sku": "BAG-01", "name": "Tote bag", "sale_price": 30.0 });
    let (_, first) = create_product(&app, body.clone()).await?;

    let (status, _) = app
        .send(Method::DELETE, &format!("/products/{}", id_of(&first)), None)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(Method::GET, &format!("/products/{}", id_of(&first)), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, second) = create_product(&app, body).await?;
    assert_eq!(status, StatusCode::CREATED, "{second}");
    assert_ne!(id_of(&first), id_of(&second));
    assert_eq!(second["sku"], "BAG-01");

    let (_, listed) = app.send(Method::GET, "/products", None).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn uploaded_image_is_served_only_to_its_company() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (_, product) = create_product(
        &app,
        json!({ "sku": "LAMP-01", "name": "Lamp", "sale_price": 99.0 }),
    )
    .await?;
    let product_id = id_of(&product);

    let upload = Request::builder()
        .method(Method::PUT)
        .uri(format!("/products/{product_id}/image"))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.tenant.token))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(PNG_BYTES))?;
    let (status, stored) = read_json(app.raw(upload).await?).await?;
    assert_eq!(status, StatusCode::OK, "{stored}");
    let key = stored["key"].as_str().unwrap_or_default().to_string();
    let url = stored["url"].as_str().unwrap_or_default().to_string();
    assert!(key.starts_with(&format!("companies/{}/products/{product_id}/", app.tenant.company_id)));
    assert!(key.ends_with(".png"));
    assert_eq!(url, format!("/storage/{key}"));

    let (_, reloaded) = app
        .send(Method::GET, &format!("/products/{product_id}"), None)
        .await?;
    assert_eq!(reloaded["image_url"], url.as_str());

    let fetch = Request::builder()
        .uri(&url)
        .header(header::AUTHORIZATION, format!("Bearer {}", app.tenant.token))
        .body(Body::empty())?;
    let response = app.raw(fetch).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("image/png")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], PNG_BYTES);

    let intruder = app.other_tenant().await?;
    let (status, _) = app.send_as(&intruder, Method::GET, &url, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn non_image_upload_is_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (_, product) = create_product(
        &app,
        json!({ "sku": "DOC-01", "name": "Manual", "sale_price": 1.0 }),
    )
    .await?;

    let upload = Request::builder()
        .method(Method::PUT)
        .uri(format!("/products/{}/image", id_of(&product)))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.tenant.token))
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from("%PDF-1.4"))?;
    let (status, error) = read_json(app.raw(upload).await?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "unsupported_media_type");
    Ok(())
}
