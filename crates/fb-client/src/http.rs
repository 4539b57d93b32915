//! reqwest-backed [`OrderBackend`].

use std::time::Duration;

use async_trait::async_trait;
use fb_schemas::{
    ActionAck, ChangeStateRequest, CreatedOrder, NewOrder, Order, OrderFilter, ResultAck,
    SetActionRequest, SubmitResultRequest,
};
use fb_workflow::{BackendError, OrderBackend, Session};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::graphql::{self, GraphqlResponse};

/// Connection settings for the order backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub graphql_path: String,
    pub timeout: Duration,
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            graphql_path: "/graphql".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpOrderBackend {
    http: reqwest::Client,
    cfg: HttpBackendConfig,
    base: Url,
}

impl HttpOrderBackend {
    pub fn new(cfg: HttpBackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("http client build failed: {e}")))?;
        Self::with_client(http, cfg)
    }

    /// Fails when `cfg.base_url` is not an absolute http(s) URL.
    pub fn with_client(http: reqwest::Client, cfg: HttpBackendConfig) -> Result<Self, BackendError> {
        let base = parse_base_url(&cfg.base_url)?;
        Ok(Self { http, cfg, base })
    }

    /// Fixed route such as `/order/set-action`.
    fn url(&self, path: &str) -> Url {
        endpoint(&self.base, path.split('/').filter(|s| !s.is_empty()))
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let req = self.http.post(self.url(path)).json(body);
        send_json(req, session, path).await
    }
}

/// Backend base URL, checked once so that every later join succeeds.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, BackendError> {
    let url = Url::parse(raw).map_err(|e| BackendError::Rejected {
        status: 0,
        message: format!("invalid backend url '{raw}': {e}"),
    })?;
    if url.cannot_be_a_base() {
        return Err(BackendError::Rejected {
            status: 0,
            message: format!("backend url '{raw}' cannot carry a path"),
        });
    }
    Ok(url)
}

/// `base` with each segment appended as one percent-encoded path segment,
/// so an id containing `/`, `?` or `#` stays inside its segment.
pub(crate) fn endpoint<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Attach the bearer token, send, and map the status to [`BackendError`].
pub(crate) async fn send_json<T: DeserializeOwned>(
    req: RequestBuilder,
    session: &Session,
    what: &str,
) -> Result<T, BackendError> {
    let resp = send(req, session, what).await?;
    resp.json::<T>()
        .await
        .map_err(|e| BackendError::Decode(format!("{what}: {e}")))
}

pub(crate) async fn send(
    req: RequestBuilder,
    session: &Session,
    what: &str,
) -> Result<Response, BackendError> {
    let resp = req
        .bearer_auth(session.bearer_token())
        .send()
        .await
        .map_err(|e| BackendError::Transport(format!("{what}: {e}")))?;

    let status = resp.status();
    debug!(what, status = status.as_u16(), "backend response");
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(map_status(status, what, &body))
}

pub(crate) fn map_status(status: StatusCode, what: &str, body: &str) -> BackendError {
    let message = error_message(body).unwrap_or_else(|| format!("{what}: http {}", status.as_u16()));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::CONFLICT => BackendError::Conflict(message),
        s if s.is_server_error() => BackendError::Transport(message),
        s => BackendError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

/// `message` or `error` field of a JSON error body, if any.
fn error_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    v.get("message")
        .or_else(|| v.get("error"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

#[async_trait]
impl OrderBackend for HttpOrderBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_order(&self, session: &Session, id: &str) -> Result<Order, BackendError> {
        let req = self.http.get(endpoint(&self.base, ["order", id]));
        send_json(req, session, "GET /order").await
    }

    async fn list_orders(
        &self,
        session: &Session,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, BackendError> {
        let body = graphql::list_orders_request(filter);
        let resp: GraphqlResponse<graphql::ListOrdersData> =
            self.post(session, &self.cfg.graphql_path, &body).await?;
        Ok(resp.into_data()?.list_orders_extended)
    }

    async fn set_order_action(
        &self,
        session: &Session,
        req: &SetActionRequest,
    ) -> Result<ActionAck, BackendError> {
        self.post(session, "/order/set-action", req).await
    }

    async fn submit_order_result(
        &self,
        session: &Session,
        req: &SubmitResultRequest,
    ) -> Result<ResultAck, BackendError> {
        self.post(session, "/order/submit-order-result", req).await
    }

    async fn change_state(
        &self,
        session: &Session,
        req: &ChangeStateRequest,
    ) -> Result<ActionAck, BackendError> {
        self.post(session, "/orders/changestate", req).await
    }

    async fn create_order(
        &self,
        session: &Session,
        order: &NewOrder,
    ) -> Result<CreatedOrder, BackendError> {
        let mut req = self.http.post(self.url("/order")).json(order);
        if let Some(key) = order.idempotency_key.as_deref() {
            req = req.header("Idempotency-Key", key);
        }
        send_json(req, session, "POST /order").await
    }
}
