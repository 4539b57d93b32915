//! Workflow Gateway: the single choke-point for order transitions.
//!
//! ```text
//! caller
//!   │
//!   └──► WorkflowGateway::request_transition(session, order, action)
//!              │
//!              ├── plan_transition(order, session.role(), action) no I/O
//!              │        └── illegal ──► WorkflowError::Invalid
//!              │
//!              ├── exactly one mutating call (never retried)
//!              │        ├── set-action / submit-order-result   TransitionApi::TaskActions
//!              │        └── changestate                        TransitionApi::ChangeState
//!              │
//!              ├── refused   ──► re-fetch ──► WorkflowError::Conflict { current }
//!              ├── ambiguous ──► re-fetch ──► WorkflowError::Ambiguous { last_known }
//!              │
//!              └── partial validation ──► residual order
//!                       ├── id reported by the backend
//!                       ├── created here with key `residual-{parent}`
//!                       └── creation failed ──► ResidualLedger (operator retry)
//! ```
//!
//! The backend stays the authority. After a successful mutation the gateway
//! re-reads the order instead of assuming the new status.

use std::sync::Arc;

use fb_schemas::{
    ChangeStateRequest, Order, OrderFilter, OrderStatus, SetActionRequest, SubmitResultRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{BackendError, OrderBackend, RoleNotHeld, Session};
use crate::oms::state_machine::{plan_transition, OrderView, PlannedTransition, TransitionError};
use crate::oms::{Action, ActionKind, Role};
use crate::residual::{residual_order, PendingResidual, ResidualLedger, ResidualStatusPolicy};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Which backend endpoints carry a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionApi {
    /// `set-action` for stage decisions, `submit-order-result` for IOB
    /// results and partial validations.
    #[default]
    TaskActions,
    /// `changestate` with the target status computed locally.
    ChangeState,
}

impl TransitionApi {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task-actions" | "task_actions" => Some(TransitionApi::TaskActions),
            "change-state" | "change_state" | "changestate" => Some(TransitionApi::ChangeState),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GatewaySettings {
    pub api: TransitionApi,
    pub residual_policy: ResidualStatusPolicy,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What became of the residual of a partial validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResidualOutcome {
    /// The backend created the residual as part of the result submission.
    CreatedByBackend { order_id: String },
    /// The gateway created it with a follow-up call.
    Created { order_id: String },
    /// Creation failed; the residual sits in the ledger until retried.
    Pending {
        parent_order_id: String,
        quantity: u64,
        error: String,
    },
}

/// A transition the backend accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub order_id: String,
    pub role: Role,
    pub action: ActionKind,
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Authoritative re-read; `None` if that read failed.
    pub order: Option<Order>,
    pub residual: Option<ResidualOutcome>,
}

/// Result of one ledger entry in [`WorkflowGateway::retry_pending_residuals`]
/// or of [`WorkflowGateway::recover_residual`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ResidualRetry {
    Created {
        parent_order_id: String,
        order_id: String,
    },
    /// The residual was found already created; nothing was sent.
    AlreadyCreated {
        parent_order_id: String,
        order_id: String,
    },
    Failed {
        parent_order_id: String,
        attempts: u32,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// WorkflowError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowError {
    /// Refused locally; nothing was sent.
    Invalid(TransitionError),
    /// Credential missing, expired or refused. Re-authenticate.
    Unauthorized(String),
    /// The caller asked to act as a stage its token does not grant.
    Forbidden(String),
    /// The backend refused the transition. `current` is the re-fetched order.
    Conflict {
        message: String,
        current: Option<Box<Order>>,
    },
    /// The mutation may or may not have applied. `last_known` is the result
    /// of a single re-fetch.
    Ambiguous {
        error: String,
        last_known: Option<Box<Order>>,
    },
    Backend(BackendError),
}

impl WorkflowError {
    /// Status the backend reported after the failure, if known.
    pub fn current_status(&self) -> Option<OrderStatus> {
        match self {
            WorkflowError::Conflict { current, .. } => current.as_ref().map(|o| o.order_status),
            WorkflowError::Ambiguous { last_known, .. } => {
                last_known.as_ref().map(|o| o.order_status)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowError::Invalid(e) => write!(f, "TRANSITION_INVALID: {e}"),
            WorkflowError::Unauthorized(msg) => write!(f, "UNAUTHORIZED: {msg}"),
            WorkflowError::Forbidden(msg) => write!(f, "FORBIDDEN: {msg}"),
            WorkflowError::Conflict { message, current } => match current {
                Some(o) => write!(
                    f,
                    "CONFLICT: {message}; order {} is now {}",
                    o.id, o.order_status
                ),
                None => write!(f, "CONFLICT: {message}; current state unknown"),
            },
            WorkflowError::Ambiguous { error, last_known } => match last_known {
                Some(o) => write!(
                    f,
                    "OUTCOME_UNKNOWN: {error}; order {} last seen as {}",
                    o.id, o.order_status
                ),
                None => write!(f, "OUTCOME_UNKNOWN: {error}; order could not be re-read"),
            },
            WorkflowError::Backend(e) => write!(f, "BACKEND: {e}"),
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<TransitionError> for WorkflowError {
    fn from(e: TransitionError) -> Self {
        WorkflowError::Invalid(e)
    }
}

impl From<RoleNotHeld> for WorkflowError {
    fn from(e: RoleNotHeld) -> Self {
        WorkflowError::Forbidden(e.to_string())
    }
}

impl From<BackendError> for WorkflowError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unauthorized(msg) => WorkflowError::Unauthorized(msg),
            other => WorkflowError::Backend(other),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowGateway
// ---------------------------------------------------------------------------

/// Reply to the single mutating call.
struct Applied {
    residual_order_id: Option<String>,
}

pub struct WorkflowGateway<B: OrderBackend> {
    backend: B,
    settings: GatewaySettings,
    ledger: Arc<ResidualLedger>,
}

impl<B: OrderBackend> WorkflowGateway<B> {
    pub fn new(backend: B, settings: GatewaySettings) -> Self {
        Self::with_ledger(backend, settings, Arc::new(ResidualLedger::new()))
    }

    pub fn with_ledger(backend: B, settings: GatewaySettings, ledger: Arc<ResidualLedger>) -> Self {
        Self {
            backend,
            settings,
            ledger,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> GatewaySettings {
        self.settings
    }

    pub fn ledger(&self) -> &Arc<ResidualLedger> {
        &self.ledger
    }

    /// Authoritative read of one order.
    pub async fn refresh(&self, session: &Session, id: &str) -> Result<Order, WorkflowError> {
        Ok(self.backend.fetch_order(session, id).await?)
    }

    /// Order plus the actions `session.role()` may take on it right now.
    pub async fn view(&self, session: &Session, id: &str) -> Result<OrderView, WorkflowError> {
        let order = self.refresh(session, id).await?;
        Ok(OrderView::of(order, session.role()))
    }

    pub async fn list(
        &self,
        session: &Session,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderView>, WorkflowError> {
        let orders = self.backend.list_orders(session, filter).await?;
        Ok(orders
            .into_iter()
            .map(|o| OrderView::of(o, session.role()))
            .collect())
    }

    /// Request `action` on `order` as `session.role()`.
    ///
    /// `order` is the caller's current view. The request is planned against
    /// it before anything is sent; an illegal request returns
    /// [`WorkflowError::Invalid`] without touching the backend.
    pub async fn request_transition(
        &self,
        session: &Session,
        order: &Order,
        action: &Action,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let plan = plan_transition(order, session.role(), action)?;

        let applied = match self.send(session, order, &plan).await {
            Ok(applied) => applied,
            Err(e) => return Err(self.after_failure(session, order, &plan, e).await),
        };

        info!(
            order_id = %plan.order_id,
            role = %plan.role,
            action = %plan.action.kind(),
            from = %plan.from,
            to = %plan.to,
            backend = self.backend.name(),
            "transition applied"
        );

        let residual = match plan.validated_quantity() {
            Some(vq) => Some(self.settle_residual(session, order, vq, applied).await),
            None => None,
        };

        let current = match self.backend.fetch_order(session, &plan.order_id).await {
            Ok(o) => {
                if o.order_status != plan.to {
                    warn!(
                        order_id = %plan.order_id,
                        expected = %plan.to,
                        actual = %o.order_status,
                        "backend reports a different status after transition"
                    );
                }
                Some(o)
            }
            Err(e) => {
                warn!(order_id = %plan.order_id, error = %e, "re-read after transition failed");
                None
            }
        };

        Ok(TransitionOutcome {
            order_id: plan.order_id.clone(),
            role: plan.role,
            action: plan.action.kind(),
            from: plan.from,
            to: plan.to,
            order: current,
            residual,
        })
    }

    /// Re-submit every ledger entry once, with its original idempotency key.
    pub async fn retry_pending_residuals(&self, session: &Session) -> Vec<ResidualRetry> {
        let mut out = Vec::new();
        for pending in self.ledger.pending().await {
            out.push(self.retry_one(session, pending).await);
        }
        out
    }

    /// Ledger entries whose parent order the caller can read on the
    /// backend. Entries for parents the backend no longer knows are left out.
    ///
    /// # Errors
    /// A credential the backend refuses fails the whole listing.
    pub async fn visible_residuals(
        &self,
        session: &Session,
    ) -> Result<Vec<PendingResidual>, WorkflowError> {
        let mut out = Vec::new();
        for pending in self.ledger.pending().await {
            match self
                .backend
                .fetch_order(session, &pending.parent_order_id)
                .await
            {
                Ok(_) => out.push(pending),
                Err(BackendError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(out)
    }

    /// Make sure the residual owed by `parent_id` exists, creating it only
    /// when it cannot be found.
    ///
    /// In order: a residual this process saw created is reported as
    /// `AlreadyCreated` without any call; a pending ledger entry is retried
    /// with its payload; otherwise the residual is re-derived from the
    /// backend's copy of the parent, looked up among the investor's orders
    /// by `parentOrderId`, and created under the usual key only if absent.
    /// `None` when the parent is not partially validated.
    pub async fn recover_residual(
        &self,
        session: &Session,
        parent_id: &str,
    ) -> Result<Option<ResidualRetry>, WorkflowError> {
        if let Some(order_id) = self.ledger.settled(parent_id).await {
            return Ok(Some(ResidualRetry::AlreadyCreated {
                parent_order_id: parent_id.to_string(),
                order_id,
            }));
        }
        if let Some(pending) = self.ledger.get(parent_id).await {
            return Ok(Some(self.retry_one(session, pending).await));
        }

        let parent = self.refresh(session, parent_id).await?;
        let vq = match (parent.order_status, parent.validated_quantity) {
            (OrderStatus::PartiallyValidated, Some(vq)) => vq,
            _ => return Ok(None),
        };
        let Some(order) = residual_order(&parent, vq, self.settings.residual_policy) else {
            return Ok(None);
        };

        if let Some(order_id) = self.find_residual(session, &parent).await? {
            self.ledger.settle(&parent.id, &order_id).await;
            info!(parent_order_id = %parent.id, order_id = %order_id, "residual order already exists");
            return Ok(Some(ResidualRetry::AlreadyCreated {
                parent_order_id: parent.id,
                order_id,
            }));
        }

        let pending = PendingResidual {
            parent_order_id: parent.id.clone(),
            order,
            last_error: String::new(),
            attempts: 0,
        };
        Ok(Some(self.retry_one(session, pending).await))
    }

    /// Id of an order on the backend that carries `parent`'s remainder. A
    /// listing failure other than a refused credential is treated as "not
    /// found"; the idempotency key still covers the create that follows.
    async fn find_residual(
        &self,
        session: &Session,
        parent: &Order,
    ) -> Result<Option<String>, WorkflowError> {
        let filter = OrderFilter {
            investor_id: Some(parent.investor_id.clone()),
            ..OrderFilter::default()
        };
        match self.backend.list_orders(session, &filter).await {
            Ok(orders) => Ok(orders
                .into_iter()
                .find(|o| o.parent_order_id.as_deref() == Some(parent.id.as_str()))
                .map(|o| o.id)),
            Err(BackendError::Unauthorized(msg)) => Err(WorkflowError::Unauthorized(msg)),
            Err(e) => {
                warn!(parent_order_id = %parent.id, error = %e, "residual lookup failed");
                Ok(None)
            }
        }
    }

    async fn retry_one(&self, session: &Session, pending: PendingResidual) -> ResidualRetry {
        let parent = pending.parent_order_id.clone();
        match self.backend.create_order(session, &pending.order).await {
            Ok(created) => {
                self.ledger.settle(&parent, &created.id).await;
                info!(parent_order_id = %parent, order_id = %created.id, "residual order created on retry");
                ResidualRetry::Created {
                    parent_order_id: parent,
                    order_id: created.id,
                }
            }
            Err(e) => {
                let error = e.to_string();
                self.ledger
                    .record_failure(&parent, pending.order, error.clone())
                    .await;
                warn!(parent_order_id = %parent, error = %error, "residual order retry failed");
                ResidualRetry::Failed {
                    parent_order_id: parent,
                    attempts: pending.attempts + 1,
                    error,
                }
            }
        }
    }

    // -- mutation -----------------------------------------------------------

    async fn send(
        &self,
        session: &Session,
        order: &Order,
        plan: &PlannedTransition,
    ) -> Result<Applied, BackendError> {
        match self.settings.api {
            TransitionApi::ChangeState => {
                let req = ChangeStateRequest {
                    id: plan.order_id.clone(),
                    state: plan.to,
                    validated_quantity: plan.validated_quantity(),
                    validated_price: plan.validated_price(),
                };
                let ack = self.backend.change_state(session, &req).await?;
                if !ack.success {
                    return Err(refused(ack.message));
                }
                Ok(Applied {
                    residual_order_id: None,
                })
            }
            TransitionApi::TaskActions if uses_result_endpoint(plan) => {
                let quantity = match plan.action {
                    Action::PartialValidate { quantity, .. } => Some(quantity),
                    Action::Validate => Some(order.quantity),
                    _ => None,
                };
                let req = SubmitResultRequest {
                    order_id: plan.order_id.clone(),
                    task_id: plan.role.task_id().to_string(),
                    action: plan.action.kind().wire_name().to_string(),
                    quantity,
                    price: plan.validated_price(),
                    motif: plan.action.motif().map(str::to_string),
                };
                let ack = self.backend.submit_order_result(session, &req).await?;
                if !ack.success {
                    return Err(refused(ack.message));
                }
                Ok(Applied {
                    residual_order_id: ack.residual_order_id,
                })
            }
            TransitionApi::TaskActions => {
                let req = SetActionRequest {
                    order_id: plan.order_id.clone(),
                    task_id: plan.role.task_id().to_string(),
                    action: plan.action.kind().wire_name().to_string(),
                    motif: plan.action.motif().map(str::to_string),
                };
                let ack = self.backend.set_order_action(session, &req).await?;
                if !ack.success {
                    return Err(refused(ack.message));
                }
                Ok(Applied {
                    residual_order_id: None,
                })
            }
        }
    }

    async fn after_failure(
        &self,
        session: &Session,
        order: &Order,
        plan: &PlannedTransition,
        err: BackendError,
    ) -> WorkflowError {
        match err {
            BackendError::Conflict(message) => {
                let current = self.backend.fetch_order(session, &plan.order_id).await.ok();
                warn!(
                    order_id = %plan.order_id,
                    role = %plan.role,
                    message = %message,
                    current = ?current.as_ref().map(|o| o.order_status),
                    "backend refused transition"
                );
                WorkflowError::Conflict {
                    message,
                    current: current.map(Box::new),
                }
            }
            e if e.is_ambiguous() => {
                let error = e.to_string();
                let last_known = self.backend.fetch_order(session, &plan.order_id).await.ok();
                warn!(
                    order_id = %plan.order_id,
                    role = %plan.role,
                    error = %error,
                    last_known = ?last_known.as_ref().map(|o| o.order_status),
                    "transition outcome unknown"
                );
                // The partial validation went through even though the reply
                // was lost: its residual is now owed.
                if let (Some(vq), Some(seen)) = (plan.validated_quantity(), last_known.as_ref()) {
                    if seen.order_status == plan.to {
                        if let Some(residual) = residual_order(order, vq, self.settings.residual_policy) {
                            self.ledger
                                .record_failure(&plan.order_id, residual, error.clone())
                                .await;
                        }
                    }
                }
                WorkflowError::Ambiguous {
                    error,
                    last_known: last_known.map(Box::new),
                }
            }
            other => other.into(),
        }
    }

    // -- residual -------------------------------------------------------------

    async fn settle_residual(
        &self,
        session: &Session,
        parent: &Order,
        validated_quantity: u64,
        applied: Applied,
    ) -> ResidualOutcome {
        if let Some(order_id) = applied.residual_order_id {
            self.ledger.settle(&parent.id, &order_id).await;
            info!(parent_order_id = %parent.id, order_id = %order_id, "residual order created by backend");
            return ResidualOutcome::CreatedByBackend { order_id };
        }

        let Some(residual) =
            residual_order(parent, validated_quantity, self.settings.residual_policy)
        else {
            // plan_transition guarantees validated_quantity < quantity.
            return ResidualOutcome::Pending {
                parent_order_id: parent.id.clone(),
                quantity: 0,
                error: "no residual quantity".to_string(),
            };
        };
        let quantity = residual.quantity;

        match self.backend.create_order(session, &residual).await {
            Ok(created) => {
                self.ledger.settle(&parent.id, &created.id).await;
                info!(
                    parent_order_id = %parent.id,
                    order_id = %created.id,
                    quantity,
                    "residual order created"
                );
                ResidualOutcome::Created {
                    order_id: created.id,
                }
            }
            Err(e) => {
                let error = e.to_string();
                self.ledger
                    .record_failure(&parent.id, residual, error.clone())
                    .await;
                warn!(
                    parent_order_id = %parent.id,
                    quantity,
                    error = %error,
                    "residual order creation failed; kept in ledger"
                );
                ResidualOutcome::Pending {
                    parent_order_id: parent.id.clone(),
                    quantity,
                    error,
                }
            }
        }
    }
}

/// IOB results and partial validations carry quantities, so they go through
/// `submit-order-result`. Cancel always goes through `set-action`.
fn uses_result_endpoint(plan: &PlannedTransition) -> bool {
    let kind = plan.action.kind();
    kind == ActionKind::PartialValidate
        || (plan.role == Role::IobResultSubmitter && kind != ActionKind::Cancel)
}

fn refused(message: Option<String>) -> BackendError {
    BackendError::Conflict(message.unwrap_or_else(|| "backend refused the transition".to_string()))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
