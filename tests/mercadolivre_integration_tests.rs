//! Mercado Livre connect flow, token handling, fetching and listing sync
//! against a mocked marketplace.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use backoffice::marketplace::{Fetcher, MarketplaceError};
use backoffice::models::connection_token;
use backoffice::models::ml_integration::{self, IntegrationStatus};
use backoffice::repositories::ml_integration::TokenPair;
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{TestApp, read_json, test_config};

const STORE_ID: &str = "123456";

async fn app_against(server: &MockServer) -> Result<TestApp> {
    TestApp::with_config(test_config(Some(&server.uri()))).await
}

async fn connect_integration(
    app: &TestApp,
    expires_in: Duration,
) -> Result<ml_integration::Model> {
    let tokens = TokenPair {
        access_token: "APP_USR-stored".to_string(),
        refresh_token: Some("TG-refresh-1".to_string()),
        expires_at: Some(Utc::now() + expires_in),
    };
    Ok(app
        .state
        .integrations()
        .upsert_connected(
            app.tenant.company_id,
            STORE_ID,
            Some("ACME_STORE".to_string()),
            &tokens,
        )
        .await?)
}

fn token_body(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 21600,
        "scope": "offline_access read write",
        "user_id": 123456,
        "refresh_token": refresh,
    })
}

fn item(id: &str, sku: &str, price: f64) -> Value {
    json!({
        "id": id,
        "title": format!("Listing {id}"),
        "price": price,
        "available_quantity": 5,
        "status": "active",
        "permalink": format!("https://produto.mercadolivre.com.br/{id}"),
        "attributes": [{ "id": "SELLER_SKU", "value_name": sku }],
        "variations": [],
    })
}

async fn mount_three_listings(server: &MockServer) {
    let search = format!("/users/{STORE_ID}/items/search");
    Mock::given(method("GET"))
        .and(path(search.as_str()))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": ["MLB1", "MLB2"],
            "paging": { "total": 3, "offset": 0, "limit": 2 },
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(search.as_str()))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": ["MLB3"],
            "paging": { "total": 3, "offset": 2, "limit": 2 },
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("ids", "MLB1,MLB2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "code": 200, "body": item("MLB1", "MUG-01", 25.0) },
            { "code": 200, "body": item("MLB2", "CUP-01", 12.5) },
        ])))
        .expect(1..)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("ids", "MLB3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "code": 200, "body": item("MLB3", "LID-01", 3.0) },
        ])))
        .expect(1..)
        .mount(server)
        .await;
}

fn location(response: &axum::response::Response) -> Result<String> {
    Ok(response
        .headers()
        .get(header::LOCATION)
        .context("missing Location header")?
        .to_str()?
        .to_string())
}

async fn get_public(app: &TestApp, uri: &str) -> Result<axum::response::Response> {
    app.raw(Request::builder().uri(uri).body(Body::empty())?).await
}

#[tokio::test]
async fn connection_token_redirects_once() -> Result<()> {
    let server = MockServer::start().await;
    let app = app_against(&server).await?;

    let (status, issued) = app
        .send(Method::POST, "/integrations/mercadolivre/connection-token", None)
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{issued}");
    let connect_path = issued["connect_path"].as_str().unwrap_or_default().to_string();
    assert!(connect_path.starts_with("/integrations/mercadolivre/connect?token="));

    let first = get_public(&app, &connect_path).await?;
    assert_eq!(first.status(), StatusCode::FOUND);
    let authorize = Url::parse(&location(&first)?)?;
    assert_eq!(authorize.path(), "/authorization");
    let params: Vec<(String, String)> = authorize.query_pairs().into_owned().collect();
    assert!(params.contains(&("client_id".to_string(), "test-client".to_string())));
    assert!(params.contains(&("code_challenge_method".to_string(), "S256".to_string())));
    assert!(params.iter().any(|(k, v)| k == "state" && !v.is_empty()));

    let second = get_public(&app, &connect_path).await?;
    let (status, error) = read_json(second).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "invalid_connection_token");
    Ok(())
}

#[tokio::test]
async fn callback_stores_the_integration_and_rejects_replay() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("APP_USR-new", "TG-r1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": 123456, "nickname": "ACME_STORE" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    let app = app_against(&server).await?;

    let (status, started) = app
        .send(Method::POST, "/integrations/mercadolivre/authorize", None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{started}");
    let authorize = Url::parse(started["authorize_url"].as_str().unwrap_or_default())?;
    let oauth_state = authorize
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .context("authorize URL without state")?;

    let callback = format!("/integrations/mercadolivre/callback?code=TG-code&state={oauth_state}");
    let response = get_public(&app, &callback).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response)?,
        "http://frontend.test/integrations?mercadolivre=connected"
    );

    let (_, integrations) = app
        .send(Method::GET, "/integrations/mercadolivre", None)
        .await?;
    let rows = integrations.as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["external_store_id"], STORE_ID);
    assert_eq!(rows[0]["nickname"], "ACME_STORE");
    assert_eq!(rows[0]["status"], "active");
    assert_eq!(rows[0]["has_refresh_token"], true);

    let replay = get_public(&app, &callback).await?;
    let (status, error) = read_json(replay).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "invalid_oauth_state");
    Ok(())
}

#[tokio::test]
async fn declined_authorization_is_reported() -> Result<()> {
    let app = TestApp::spawn().await?;
    let response = get_public(
        &app,
        "/integrations/mercadolivre/callback?error=access_denied&state=whatever",
    )
    .await?;
    let (status, error) = read_json(response).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "authorization_declined");
    Ok(())
}

#[tokio::test]
async fn rejected_token_is_refreshed_once_then_the_original_status_surfaces() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/users/{STORE_ID}/items/search").as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "invalid_token" })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("APP_USR-fresh", "TG-refresh-2")))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_against(&server).await?;
    let integration = connect_integration(&app, Duration::hours(6)).await?;

    let tokens = app.state.token_manager();
    let mut fetcher = Fetcher::open(&tokens, &app.state.config.sync, integration).await?;
    let err = fetcher.listings().await.expect_err("fetch must fail");
    assert_eq!(err.upstream_status(), Some(401));
    assert!(matches!(err, MarketplaceError::Upstream { status: 401, .. }));

    let stored = app
        .state
        .integrations()
        .get(app.tenant.company_id, fetcher.integration().id)
        .await?;
    assert_eq!(
        app.state.integrations().access_token(&stored)?.as_deref(),
        Some("APP_USR-fresh")
    );
    Ok(())
}

#[tokio::test]
async fn stale_token_with_revoked_grant_marks_the_integration() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_against(&server).await?;
    let integration = connect_integration(&app, Duration::hours(-1)).await?;
    let id = integration.id;

    let tokens = app.state.token_manager();
    let err = tokens.bearer(integration).await.expect_err("refresh must fail");
    assert!(matches!(err, MarketplaceError::TokenRefreshFailed { status: 400, .. }));

    let stored = app.state.integrations().get(app.tenant.company_id, id).await?;
    assert_eq!(stored.status, IntegrationStatus::Error);
    Ok(())
}

#[tokio::test]
async fn listings_are_paginated_and_fetched_in_chunks() -> Result<()> {
    let server = MockServer::start().await;
    let search = format!("/users/{STORE_ID}/items/search");
    Mock::given(method("GET"))
        .and(path(search.as_str()))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": ["MLB1", "MLB2"],
            "paging": { "total": 3, "offset": 0, "limit": 2 },
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(search.as_str()))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": ["MLB3"],
            "paging": { "total": 3, "offset": 2, "limit": 2 },
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("ids", "MLB1,MLB2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "code": 200, "body": item("MLB1", "MUG-01", 25.0) },
            { "code": 404, "body": { "message": "Item not found" } },
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("ids", "MLB3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "code": 200, "body": item("MLB3", "LID-01", 3.0) },
        ])))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_against(&server).await?;
    let integration = connect_integration(&app, Duration::hours(6)).await?;

    let tokens = app.state.token_manager();
    let mut fetcher = Fetcher::open(&tokens, &app.state.config.sync, integration).await?;
    let records = fetcher.listings().await?;

    let ids: Vec<&str> = records.iter().map(|r| r.external_listing_id.as_str()).collect();
    assert_eq!(ids, vec!["MLB1", "MLB3"]);
    assert_eq!(records[0].seller_sku.as_deref(), Some("MUG-01"));
    assert_eq!(records[0].price_cents, 2500);
    Ok(())
}

#[tokio::test]
async fn repeated_sync_updates_listings_in_place() -> Result<()> {
    let server = MockServer::start().await;
    mount_three_listings(&server).await;
    let app = app_against(&server).await?;
    connect_integration(&app, Duration::hours(6)).await?;

    for _ in 0..2 {
        let (status, summary) = app
            .send(Method::POST, "/integrations/mercadolivre/sync", None)
            .await?;
        assert_eq!(status, StatusCode::OK, "{summary}");
        assert_eq!(summary["integrations"], 1);
        assert_eq!(summary["fetched"], 3);
        assert_eq!(summary["upserted"], 3);
        assert_eq!(summary["failed"], 0);

        let (_, listings) = app
            .send(Method::GET, "/integrations/mercadolivre/listings", None)
            .await?;
        assert_eq!(listings.as_array().map(Vec::len), Some(3));
    }
    Ok(())
}

#[tokio::test]
async fn disconnect_purges_listings_and_mappings() -> Result<()> {
    let server = MockServer::start().await;
    mount_three_listings(&server).await;
    let app = app_against(&server).await?;
    let integration = connect_integration(&app, Duration::hours(6)).await?;

    let (status, _) = app
        .send(Method::POST, "/integrations/mercadolivre/sync", None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::POST,
            "/products",
            Some(json!({ "sku": "MUG-01", "name": "Mug", "sale_price": 25.0 })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, mapping) = app
        .send(
            Method::POST,
            "/integrations/mercadolivre/mappings",
            Some(json!({
                "integration_id": integration.id,
                "external_listing_id": "MLB1",
                "product_sku": "MUG-01",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{mapping}");

    let intruder = app.other_tenant().await?;
    let (status, _) = app
        .send_as(
            &intruder,
            Method::DELETE,
            &format!("/integrations/mercadolivre/{}", integration.id),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, purged) = app
        .send(
            Method::DELETE,
            &format!("/integrations/mercadolivre/{}", integration.id),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{purged}");
    assert_eq!(purged["listings_deleted"], 3);
    assert_eq!(purged["mappings_deleted"], 1);

    let (_, listings) = app
        .send(Method::GET, "/integrations/mercadolivre/listings", None)
        .await?;
    assert_eq!(listings.as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn expired_connection_token_is_rejected() -> Result<()> {
    let server = MockServer::start().await;
    let app = app_against(&server).await?;
    let (_, issued) = app
        .send(Method::POST, "/integrations/mercadolivre/connection-token", None)
        .await?;
    connection_token::Entity::update_many()
        .col_expr(
            connection_token::Column::ExpiresAt,
            Expr::value(Utc::now() - Duration::minutes(1)),
        )
        .filter(connection_token::Column::CompanyId.eq(app.tenant.company_id))
        .exec(&*app.state.db)
        .await?;

    let response = get_public(&app, issued["connect_path"].as_str().unwrap_or_default()).await?;
    let (status, error) = read_json(response).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "invalid_connection_token");
    Ok(())
}

#[tokio::test]
async fn connect_without_client_credentials_keeps_the_token_unused() -> Result<()> {
    let mut config = test_config(None);
    config.mercadolivre.client_id = None;
    let app = TestApp::with_config(config).await?;
    let (status, issued) = app
        .send(Method::POST, "/integrations/mercadolivre/connection-token", None)
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let response = get_public(&app, issued["connect_path"].as_str().unwrap_or_default()).await?;
    let (status, error) = read_json(response).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["code"], "missing_client_credentials");

    let stored = connection_token::Entity::find()
        .filter(connection_token::Column::CompanyId.eq(app.tenant.company_id))
        .one(&*app.state.db)
        .await?
        .context("connection token row")?;
    assert!(stored.used_at.is_none());
    Ok(())
}

#[tokio::test]
async fn reconnect_refreshes_the_same_row_and_keeps_the_refresh_token() -> Result<()> {
    let server = MockServer::start().await;
    let app = app_against(&server).await?;
    let integrations = app.state.integrations();
    let first = connect_integration(&app, Duration::hours(6)).await?;

    let rotated = TokenPair {
        access_token: "APP_USR-second".to_string(),
        refresh_token: None,
        expires_at: Some(Utc::now() + Duration::hours(6)),
    };
    let second = integrations
        .upsert_connected(app.tenant.company_id, STORE_ID, None, &rotated)
        .await?;

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.connected_at >= first.connected_at);
    assert_eq!(integrations.list(app.tenant.company_id).await?.len(), 1);
    assert_eq!(
        integrations.access_token(&second)?.as_deref(),
        Some("APP_USR-second")
    );
    assert_eq!(
        integrations.refresh_token(&second)?.as_deref(),
        Some("TG-refresh-1")
    );
    Ok(())
}

#[tokio::test]
async fn integration_past_its_window_is_skipped_without_refreshing() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("APP_USR-x", "TG-x")))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/users/{STORE_ID}/items/search").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [],
            "paging": { "total": 0, "offset": 0, "limit": 2 },
        })))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [],
            "paging": { "total": 0, "offset": 0, "limit": 2 },
        })))
        .expect(0)
        .mount(&server)
        .await;
    let app = app_against(&server).await?;
    let integration = connect_integration(&app, Duration::hours(-1)).await?;
    let mut lapsed: ml_integration::ActiveModel = integration.into();
    lapsed.connected_at = Set(Utc::now() - Duration::days(366));
    lapsed.update(&*app.state.db).await?;

    let (status, summary) = app
        .send(Method::POST, "/integrations/mercadolivre/sync", None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{summary}");
    assert_eq!(summary["integrations"], 0);
    assert_eq!(summary["skipped_expired"], 1);
    assert_eq!(summary["fetched"], 0);

    let (status, report) = app
        .send(Method::GET, "/analytics/daily?from=2025-03-01&to=2025-03-02", None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["total_orders"], 0);

    let (_, integrations) = app
        .send(Method::GET, "/integrations/mercadolivre", None)
        .await?;
    assert_eq!(integrations[0]["status"], "expired");
    Ok(())
}

#[tokio::test]
async fn rejected_token_recovered_by_refresh_is_invisible_to_the_caller() -> Result<()> {
    let server = MockServer::start().await;
    let search = format!("/users/{STORE_ID}/items/search");
    Mock::given(method("GET"))
        .and(path(search.as_str()))
        .and(header("authorization", "Bearer APP_USR-stored"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "invalid_token" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(search.as_str()))
        .and(header("authorization", "Bearer APP_USR-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": ["MLB3"],
            "paging": { "total": 1, "offset": 0, "limit": 2 },
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("ids", "MLB3"))
        .and(header("authorization", "Bearer APP_USR-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "code": 200, "body": item("MLB3", "LID-01", 3.0) },
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("APP_USR-fresh", "TG-refresh-2")))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_against(&server).await?;
    connect_integration(&app, Duration::hours(6)).await?;

    let (status, summary) = app
        .send(Method::POST, "/integrations/mercadolivre/sync", None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{summary}");
    assert_eq!(summary["fetched"], 1);
    assert_eq!(summary["upserted"], 1);
    Ok(())
}

#[tokio::test]
async fn pagination_stops_at_the_item_ceiling() -> Result<()> {
    let server = MockServer::start().await;
    let search = format!("/users/{STORE_ID}/items/search");
    for (offset, ids) in [("0", json!(["MLB1", "MLB2"])), ("2", json!(["MLB3", "MLB4"]))] {
        Mock::given(method("GET"))
            .and(path(search.as_str()))
            .and(query_param("offset", offset))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": ids,
                "paging": { "total": 10, "offset": offset.parse::<u64>()?, "limit": 2 },
            })))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(search.as_str()))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": ["MLB5", "MLB6"],
            "paging": { "total": 10, "offset": 4, "limit": 2 },
        })))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(Some(&server.uri()));
    config.sync.max_items = 3;
    let app = TestApp::with_config(config).await?;
    let integration = connect_integration(&app, Duration::hours(6)).await?;

    let tokens = app.state.token_manager();
    let mut fetcher = Fetcher::open(&tokens, &app.state.config.sync, integration).await?;
    let ids: Vec<String> = fetcher.paginate(&search, Vec::new()).await?;
    assert_eq!(ids, vec!["MLB1", "MLB2", "MLB3"]);
    Ok(())
}

#[tokio::test]
async fn failing_listing_write_is_counted_while_the_rest_commits() -> Result<()> {
    let server = MockServer::start().await;
    mount_three_listings(&server).await;
    let app = app_against(&server).await?;
    connect_integration(&app, Duration::hours(6)).await?;
    app.state
        .db
        .execute_unprepared(
            "CREATE TRIGGER reject_mlb2 BEFORE INSERT ON ml_listings \
             WHEN NEW.external_listing_id = 'MLB2' \
             BEGIN SELECT RAISE(ABORT, 'listing rejected'); END;",
        )
        .await?;

    let (status, summary) = app
        .send(Method::POST, "/integrations/mercadolivre/sync", None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{summary}");
    assert_eq!(summary["fetched"], 3);
    assert_eq!(summary["upserted"], 2);
    assert_eq!(summary["failed"], 1);

    let (_, listings) = app
        .send(Method::GET, "/integrations/mercadolivre/listings", None)
        .await?;
    let ids: Vec<&str> = listings
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["external_listing_id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&"MLB2"));
    Ok(())
}

#[tokio::test]
async fn sync_names_categories_once_per_category() -> Result<()> {
    let server = MockServer::start().await;
    let mut mug = item("MLB1", "MUG-01", 25.0);
    mug["category_id"] = json!("MLB1055");
    let mut cup = item("MLB2", "CUP-01", 12.5);
    cup["category_id"] = json!("MLB1055");
    let mut lid = item("MLB3", "LID-01", 3.0);
    lid["category_id"] = json!("MLB0000");
    Mock::given(method("GET"))
        .and(path(format!("/users/{STORE_ID}/items/search").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": ["MLB1", "MLB2", "MLB3"],
            "paging": { "total": 3, "offset": 0, "limit": 50 },
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "code": 200, "body": mug },
            { "code": 200, "body": cup },
            { "code": 200, "body": lid },
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/categories/MLB1055"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "MLB1055", "name": "Canecas" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/categories/MLB0000"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Category not found" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(Some(&server.uri()));
    config.sync.item_batch_size = 20;
    let app = TestApp::with_config(config).await?;
    connect_integration(&app, Duration::hours(6)).await?;

    let (status, summary) = app
        .send(Method::POST, "/integrations/mercadolivre/sync", None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{summary}");
    assert_eq!(summary["upserted"], 3);

    let (_, listings) = app
        .send(Method::GET, "/integrations/mercadolivre/listings", None)
        .await?;
    let rows = listings.as_array().cloned().unwrap_or_default();
    let named = |id: &str| {
        rows.iter()
            .find(|r| r["external_listing_id"] == id)
            .map(|r| r["category_name"].clone())
            .unwrap_or(Value::Null)
    };
    assert_eq!(named("MLB1"), json!("Canecas"));
    assert_eq!(named("MLB2"), json!("Canecas"));
    assert_eq!(named("MLB3"), Value::Null);
    Ok(())
}

#[tokio::test]
async fn promotions_gather_every_family_for_the_store() -> Result<()> {
    let server = MockServer::start().await;
    let families = [
        ("deals", json!([{ "id": "D-1", "name": "Ofertas do dia", "status": "started" }])),
        ("campaigns", json!([{ "id": 77, "name": "Black Friday", "status": "pending" }])),
        ("promotions_packs", json!([])),
    ];
    for (family, results) in families {
        let count = results.as_array().map(Vec::len).unwrap_or_default();
        Mock::given(method("GET"))
            .and(path(format!("/users/{STORE_ID}/{family}/search").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": results,
                "paging": { "total": count, "offset": 0, "limit": 2 },
            })))
            .expect(1)
            .mount(&server)
            .await;
    }
    let app = app_against(&server).await?;
    let integration = connect_integration(&app, Duration::hours(6)).await?;
    let uri = format!("/integrations/mercadolivre/{}/promotions", integration.id);

    let (status, body) = app.send(Method::GET, &uri, None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["integration_id"], json!(integration.id));
    let promotions = body["promotions"].as_array().cloned().unwrap_or_default();
    assert_eq!(promotions.len(), 2);
    assert_eq!(promotions[0]["kind"], "deal");
    assert_eq!(promotions[0]["id"], "D-1");
    assert_eq!(promotions[1]["kind"], "campaign");
    assert_eq!(promotions[1]["id"], "77");

    let intruder = app.other_tenant().await?;
    let (status, _) = app.send_as(&intruder, Method::GET, &uri, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn unrecovered_rejection_reaches_the_client_as_bad_gateway() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/users/{STORE_ID}/items/search").as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "invalid_token" })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("APP_USR-fresh", "TG-refresh-2")))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_against(&server).await?;
    connect_integration(&app, Duration::hours(6)).await?;

    let (status, error) = app
        .send(Method::POST, "/integrations/mercadolivre/sync", None)
        .await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(error["code"], "upstream_error");
    assert_eq!(error["details"]["upstream_status"], 401);

    let (_, listings) = app
        .send(Method::GET, "/integrations/mercadolivre/listings", None)
        .await?;
    assert_eq!(listings.as_array().map(Vec::len), Some(0));
    Ok(())
}
