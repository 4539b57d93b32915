//! `/v1/actors/:kind[/:code]` maps onto the actor backend with the caller's
//! token; institution writes drop the cached institution list.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, StatusCode};
use fb_client::ActorClient;
use fb_daemon::{routes, state};
use fb_testkit::PaperBackend;
use fb_workflow::GatewaySettings;
use http_body_util::BodyExt;
use httpmock::prelude::*;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tower::ServiceExt;

fn bearer() -> String {
    let t = encode(
        &Header::default(),
        &json!({"sub": "u-7", "role": "investor", "exp": 4_000_000_000i64}),
        &EncodingKey::from_secret(b"idp-secret"),
    )
    .unwrap();
    format!("Bearer {t}")
}

fn state_over(server: &MockServer) -> Arc<state::AppState> {
    Arc::new(
        state::AppState::new(Arc::new(PaperBackend::new()), GatewaySettings::default(), 16)
            .with_actors(
                ActorClient::new(reqwest::Client::new(), &server.base_url()).unwrap(),
                Duration::from_secs(30),
            ),
    )
}

async fn call(
    st: &Arc<state::AppState>,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, bytes::Bytes) {
    let mut b = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", bearer());
    let body = match body {
        Some(v) => {
            b = b.header("Content-Type", "application/json");
            axum::body::Body::from(v.to_string())
        }
        None => axum::body::Body::empty(),
    };
    let resp = routes::build_router(Arc::clone(st))
        .oneshot(b.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.into_body().collect().await.unwrap().to_bytes())
}

#[tokio::test]
async fn get_update_delete_reach_the_item_route() {
    let server = MockServer::start_async().await;
    let get = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/agence/AG-1")
                .header_exists("Authorization");
            then.status(200).json_body(json!({"code": "AG-1", "libelle": "Agence Alger"}));
        })
        .await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/v1/agence/AG-1")
                .body_contains("\"libelle\":\"Agence Oran\"");
            then.status(200).json_body(json!({"code": "AG-1", "libelle": "Agence Oran"}));
        })
        .await;
    let del = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/v1/agence/AG-1");
            then.status(204);
        })
        .await;

    let st = state_over(&server);
    let (status, body) = call(&st, "GET", "/v1/actors/agence/AG-1", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["libelle"], "Agence Alger");

    let (status, body) = call(
        &st,
        "PUT",
        "/v1/actors/agence/AG-1",
        Some(json!({"code": "AG-1", "libelle": "Agence Oran"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["libelle"], "Agence Oran");

    let (status, _) = call(&st, "DELETE", "/v1/actors/agence/AG-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    get.assert_hits_async(1).await;
    put.assert_hits_async(1).await;
    del.assert_hits_async(1).await;
}

#[tokio::test]
async fn update_with_mismatched_code_or_bad_record_sends_nothing() {
    let server = MockServer::start_async().await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT);
            then.status(200).json_body(json!({"code": "x", "libelle": "x"}));
        })
        .await;
    let st = state_over(&server);

    let (status, _) = call(
        &st,
        "PUT",
        "/v1/actors/tcc/TCC-1",
        Some(json!({"code": "TCC-2", "libelle": "Teneur"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &st,
        "PUT",
        "/v1/actors/tcc/TCC-1",
        Some(json!({"code": "TCC-1", "libelle": " "})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["kind"], "invalid_actor");

    let (status, _) = call(&st, "GET", "/v1/actors/broker/B-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    put.assert_hits_async(0).await;
}

#[tokio::test]
async fn institution_write_drops_cached_list() {
    let server = MockServer::start_async().await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/financial-institution");
            then.status(200)
                .json_body(json!([{"code": "BNA", "libelle": "Banque Nationale"}]));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/financial-institution");
            then.status(201).json_body(json!({"code": "CPA", "libelle": "Credit Populaire"}));
        })
        .await;
    let st = state_over(&server);

    let (status, _) = call(&st, "GET", "/v1/institutions", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(
        &st,
        "POST",
        "/v1/actors/financial-institution",
        Some(json!({"code": "CPA", "libelle": "Credit Populaire"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = call(&st, "GET", "/v1/institutions", None).await;
    assert_eq!(status, StatusCode::OK);

    create.assert_hits_async(1).await;
    list.assert_hits_async(2).await;
}
