//! `/v1/institutions` goes through the TTL cache: two requests inside the
//! TTL cost one upstream call, and a cached list is only served back to the
//! token it was fetched with.

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

fn token(secret: &[u8]) -> String {
    encode(
        &Header::default(),
        &json!({"sub": "u-7", "role": "investor", "exp": 4_000_000_000i64}),
        &EncodingKey::from_secret(secret),
    )
    .unwrap()
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

async fn institutions(
    st: &Arc<state::AppState>,
    token: &str,
) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("GET")
        .uri("/v1/institutions")
        .header("Authorization", format!("Bearer {token}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = routes::build_router(Arc::clone(st)).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn institutions_are_cached() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/financial-institution");
            then.status(200)
                .json_body(json!([{"code": "BNA", "libelle": "Banque Nationale"}]));
        })
        .await;

    let st = state_over(&server);
    let token = token(b"idp-secret");
    for _ in 0..2 {
        let (status, json) = institutions(&st, &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["code"], "BNA");
    }
    upstream.assert_hits_async(1).await;
}

#[tokio::test]
async fn token_refused_upstream_gets_401_despite_warm_cache() {
    let server = MockServer::start_async().await;
    let genuine = token(b"idp-secret");
    let forged = token(b"not-the-idp");
    let accepted = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/financial-institution")
                .header("Authorization", format!("Bearer {genuine}"));
            then.status(200)
                .json_body(json!([{"code": "BNA", "libelle": "Banque Nationale"}]));
        })
        .await;
    let refused = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/financial-institution")
                .header("Authorization", format!("Bearer {forged}"));
            then.status(401).json_body(json!({"message": "invalid signature"}));
        })
        .await;

    let st = state_over(&server);
    let (status, _) = institutions(&st, &genuine).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = institutions(&st, &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["kind"], "unauthorized");

    accepted.assert_hits_async(1).await;
    refused.assert_hits_async(1).await;
}
