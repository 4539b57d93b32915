//! Order backend boundary.
//!
//! The backend owns every order and is the only enforcer of the transition
//! table. [`OrderBackend`] is the contract the gateway drives; the HTTP
//! client and the in-memory paper backend both implement it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use fb_schemas::{
    ActionAck, ChangeStateRequest, CreatedOrder, NewOrder, Order, OrderFilter, ResultAck,
    SetActionRequest, SubmitResultRequest,
};

use crate::oms::Role;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Caller identity attached to every backend request.
///
/// `role` is the stage the caller currently acts as. It is always one of
/// `granted`, the roles carried by the token; [`Session::act_as`] is the
/// only way to switch. `token` is the raw bearer credential. It never
/// appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub subject: String,
    pub negotiator_id: Option<String>,
    role: Role,
    granted: Vec<Role>,
    token: String,
}

impl Session {
    pub fn new(
        subject: impl Into<String>,
        role: Role,
        negotiator_id: Option<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            negotiator_id,
            role,
            granted: vec![role],
            token: token.into(),
        }
    }

    /// Add roles the token grants besides its primary one.
    pub fn granting(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        for r in roles {
            if !self.granted.contains(&r) {
                self.granted.push(r);
            }
        }
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn granted_roles(&self) -> &[Role] {
        &self.granted
    }

    pub fn holds(&self, role: Role) -> bool {
        self.granted.contains(&role)
    }

    pub fn bearer_token(&self) -> &str {
        &self.token
    }

    /// Same identity acting as another stage the token grants.
    pub fn act_as(&self, role: Role) -> Result<Self, RoleNotHeld> {
        if !self.holds(role) {
            return Err(RoleNotHeld {
                subject: self.subject.clone(),
                requested: role,
            });
        }
        Ok(Self {
            role,
            ..self.clone()
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("subject", &self.subject)
            .field("role", &self.role)
            .field("granted", &self.granted)
            .field("negotiator_id", &self.negotiator_id)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// A caller asked to act as a stage its token does not grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleNotHeld {
    pub subject: String,
    pub requested: Role,
}

impl fmt::Display for RoleNotHeld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subject {} does not hold role {}",
            self.subject, self.requested
        )
    }
}

impl std::error::Error for RoleNotHeld {}

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Missing, expired or refused credential (HTTP 401/403).
    Unauthorized(String),
    /// The backend refused the request against the order's current state
    /// (HTTP 409, or `success: false` on a transition).
    Conflict(String),
    NotFound(String),
    /// Any other 4xx the backend returned.
    Rejected { status: u16, message: String },
    /// The request may or may not have been applied: connection failure,
    /// timeout, or a 5xx.
    Transport(String),
    /// A response payload could not be decoded.
    Decode(String),
}

impl BackendError {
    /// `true` when the outcome of a mutating call is unknown.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, BackendError::Transport(_) | BackendError::Decode(_))
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            BackendError::Conflict(msg) => write!(f, "conflict: {msg}"),
            BackendError::NotFound(what) => write!(f, "not found: {what}"),
            BackendError::Rejected { status, message } => {
                write!(f, "backend rejected request status={status}: {message}")
            }
            BackendError::Transport(msg) => write!(f, "transport error: {msg}"),
            BackendError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

// ---------------------------------------------------------------------------
// OrderBackend trait
// ---------------------------------------------------------------------------

/// Order backend contract.
///
/// Mutating calls are sent at most once by the gateway; implementations
/// must not retry them either.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    /// Short name for logs (e.g. `"http"`, `"paper"`).
    fn name(&self) -> &'static str;

    async fn fetch_order(&self, session: &Session, id: &str) -> Result<Order, BackendError>;

    async fn list_orders(
        &self,
        session: &Session,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, BackendError>;

    /// `POST /order/set-action`
    async fn set_order_action(
        &self,
        session: &Session,
        req: &SetActionRequest,
    ) -> Result<ActionAck, BackendError>;

    /// `POST /order/submit-order-result`
    async fn submit_order_result(
        &self,
        session: &Session,
        req: &SubmitResultRequest,
    ) -> Result<ResultAck, BackendError>;

    /// `POST /orders/changestate`
    async fn change_state(
        &self,
        session: &Session,
        req: &ChangeStateRequest,
    ) -> Result<ActionAck, BackendError>;

    /// `POST /order`. A repeated `idempotency_key` returns the order created
    /// the first time.
    async fn create_order(
        &self,
        session: &Session,
        order: &NewOrder,
    ) -> Result<CreatedOrder, BackendError>;
}

#[async_trait]
impl<T: OrderBackend + ?Sized> OrderBackend for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch_order(&self, session: &Session, id: &str) -> Result<Order, BackendError> {
        (**self).fetch_order(session, id).await
    }

    async fn list_orders(
        &self,
        session: &Session,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, BackendError> {
        (**self).list_orders(session, filter).await
    }

    async fn set_order_action(
        &self,
        session: &Session,
        req: &SetActionRequest,
    ) -> Result<ActionAck, BackendError> {
        (**self).set_order_action(session, req).await
    }

    async fn submit_order_result(
        &self,
        session: &Session,
        req: &SubmitResultRequest,
    ) -> Result<ResultAck, BackendError> {
        (**self).submit_order_result(session, req).await
    }

    async fn change_state(
        &self,
        session: &Session,
        req: &ChangeStateRequest,
    ) -> Result<ActionAck, BackendError> {
        (**self).change_state(session, req).await
    }

    async fn create_order(
        &self,
        session: &Session,
        order: &NewOrder,
    ) -> Result<CreatedOrder, BackendError> {
        (**self).create_order(session, order).await
    }
}
