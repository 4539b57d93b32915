//! Deterministic in-memory order backend.
//!
//! Models the guarantees the real backend owes the console:
//! - every mutation checks the caller's stage against the current status
//!   under one lock, so at most one transition applies per request and a
//!   repeated request is refused (the source status has moved on);
//! - orders created with an idempotency key already seen return the first
//!   order instead of a second one;
//! - a request whose `taskID` names a role the caller's token does not
//!   grant is refused;
//! - a bearer token marked with [`PaperBackend::refuse_token`] is refused on
//!   every call, reads included.
//!
//! Ids are `paper-{n}` in creation order. No randomness, no timestamps.
//! Faults can be queued to exercise the console's failure handling.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use fb_schemas::{
    ActionAck, ChangeStateRequest, CreatedOrder, NewOrder, Order, OrderFilter, OrderStatus,
    ResultAck, SetActionRequest, SubmitResultRequest,
};
use fb_workflow::{
    plan_transition, residual_order, Action, ActionKind, BackendError, OrderBackend,
    ResidualStatusPolicy, Role, Session, TransitionError,
};
use tokio::sync::Mutex;
use tracing::debug;

/// A queued failure for the next mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Refuse without applying anything.
    Fail(BackendError),
    /// Apply the transition, then lose the reply.
    ApplyThenFail(BackendError),
}

/// Calls received, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounters {
    pub fetches: u32,
    pub lists: u32,
    /// set-action, submit-order-result and changestate.
    pub mutations: u32,
    pub creates: u32,
}

#[derive(Debug)]
struct Stored {
    order: Order,
    version: u64,
}

#[derive(Debug, Default)]
struct PaperState {
    orders: BTreeMap<String, Stored>,
    /// idempotency key -> order id
    keys: BTreeMap<String, String>,
    next_id: u64,
    next_mutation_fault: Option<Fault>,
    next_create_fault: Option<BackendError>,
    refused_tokens: BTreeSet<String>,
    counters: CallCounters,
}

impl PaperState {
    fn admit(&self, session: &Session) -> Result<(), BackendError> {
        if self.refused_tokens.contains(session.bearer_token()) {
            return Err(BackendError::Unauthorized(format!(
                "token of {} is not valid",
                session.subject
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PaperBackend {
    state: Mutex<PaperState>,
    /// When set, a partial result submission creates the residual itself and
    /// reports its id.
    creates_residuals: bool,
    residual_policy: ResidualStatusPolicy,
}

impl PaperBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend variant that creates residuals as part of result submission.
    pub fn creating_residuals(policy: ResidualStatusPolicy) -> Self {
        Self {
            creates_residuals: true,
            residual_policy: policy,
            ..Self::default()
        }
    }

    pub async fn insert(&self, order: Order) {
        let mut st = self.state.lock().await;
        st.orders.insert(
            order.id.clone(),
            Stored {
                order,
                version: 0,
            },
        );
    }

    /// Refuse every later call made with `token`, as the identity provider
    /// would for a revoked or forged credential.
    pub async fn refuse_token(&self, token: impl Into<String>) {
        self.state.lock().await.refused_tokens.insert(token.into());
    }

    pub async fn order(&self, id: &str) -> Option<Order> {
        self.state.lock().await.orders.get(id).map(|s| s.order.clone())
    }

    /// Number of transitions applied to `id`.
    pub async fn version(&self, id: &str) -> Option<u64> {
        self.state.lock().await.orders.get(id).map(|s| s.version)
    }

    /// Orders created as residuals of `parent_id`.
    pub async fn residuals_of(&self, parent_id: &str) -> Vec<Order> {
        self.state
            .lock()
            .await
            .orders
            .values()
            .filter(|s| s.order.parent_order_id.as_deref() == Some(parent_id))
            .map(|s| s.order.clone())
            .collect()
    }

    pub async fn counters(&self) -> CallCounters {
        self.state.lock().await.counters
    }

    pub async fn fail_next_mutation(&self, fault: Fault) {
        self.state.lock().await.next_mutation_fault = Some(fault);
    }

    pub async fn fail_next_create(&self, err: BackendError) {
        self.state.lock().await.next_create_fault = Some(err);
    }

    /// Move an order directly, as another user or a batch job would.
    pub async fn force_status(&self, id: &str, status: OrderStatus) {
        if let Some(s) = self.state.lock().await.orders.get_mut(id) {
            s.order.order_status = status;
            s.version += 1;
        }
    }

    // -- internals ------------------------------------------------------------

    /// Check and apply one transition; returns the residual id if one was
    /// created here.
    fn apply(
        &self,
        st: &mut PaperState,
        role: Role,
        id: &str,
        action: &Action,
        from_result: bool,
    ) -> Result<Option<String>, BackendError> {
        let stored = st
            .orders
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound(format!("order {id}")))?;
        let plan = plan_transition(&stored.order, role, action).map_err(refusal)?;

        stored.order.order_status = plan.to;
        if let Action::PartialValidate { quantity, price } = action {
            stored.order.validated_quantity = Some(*quantity);
            stored.order.validated_price = *price;
        }
        stored.version += 1;
        debug!(order_id = id, from = %plan.from, to = %plan.to, "paper transition");

        let vq = match plan.validated_quantity() {
            Some(vq) if from_result && self.creates_residuals => vq,
            _ => return Ok(None),
        };
        let parent = stored.order.clone();
        match residual_order(&parent, vq, self.residual_policy) {
            Some(residual) => Ok(Some(insert_new(st, &residual))),
            None => Ok(None),
        }
    }

    /// Take the queued fault, if any. `Ok(Some(e))` means apply, then fail.
    fn take_fault(st: &mut PaperState) -> Result<Option<BackendError>, BackendError> {
        match st.next_mutation_fault.take() {
            None => Ok(None),
            Some(Fault::Fail(e)) => Err(e),
            Some(Fault::ApplyThenFail(e)) => Ok(Some(e)),
        }
    }
}

fn refusal(e: TransitionError) -> BackendError {
    match e {
        TransitionError::PartialQuantityOutOfRange { .. }
        | TransitionError::PriceOutsideLimits { .. }
        | TransitionError::NotYetExpired { .. }
        | TransitionError::InvalidOrder(_) => BackendError::Rejected {
            status: 422,
            message: e.to_string(),
        },
        other => BackendError::Conflict(other.to_string()),
    }
}

fn task_role(session: &Session, task_id: &str) -> Result<Role, BackendError> {
    let role = Role::parse(task_id).ok_or_else(|| BackendError::Rejected {
        status: 422,
        message: format!("unknown taskID '{task_id}'"),
    })?;
    if !session.holds(role) {
        return Err(BackendError::Unauthorized(format!(
            "taskID '{task_id}' is not granted to {}",
            session.subject
        )));
    }
    Ok(role)
}

fn wire_action(
    name: &str,
    quantity: Option<u64>,
    price: Option<i64>,
    motif: Option<String>,
) -> Result<Action, BackendError> {
    ActionKind::parse(name)
        .and_then(|k| Action::from_parts(k, quantity, price, motif))
        .ok_or_else(|| BackendError::Rejected {
            status: 422,
            message: format!("unsupported action '{name}'"),
        })
}

fn insert_new(st: &mut PaperState, new: &NewOrder) -> String {
    if let Some(existing) = new.idempotency_key.as_ref().and_then(|k| st.keys.get(k)) {
        return existing.clone();
    }
    st.next_id += 1;
    let id = format!("paper-{}", st.next_id);
    let order = Order {
        id: id.clone(),
        order_direction: new.order_direction,
        security_id: new.security_id.clone(),
        security_type: new.security_type,
        security_issuer: new.security_issuer.clone(),
        market: Some(new.market),
        quantity: new.quantity,
        price_limit_min: new.price_limit_min,
        price_limit_max: new.price_limit_max,
        duration: new.duration,
        validity: new.validity,
        order_date: None,
        created_at: None,
        order_status: new.order_status,
        investor_id: new.investor_id.clone(),
        negotiator_id: new.negotiator_id.clone(),
        payed_with_card: false,
        validated_quantity: None,
        validated_price: None,
        parent_order_id: new.parent_order_id.clone(),
    };
    if let Some(k) = &new.idempotency_key {
        st.keys.insert(k.clone(), id.clone());
    }
    st.orders.insert(
        id.clone(),
        Stored {
            order,
            version: 0,
        },
    );
    id
}

#[async_trait]
impl OrderBackend for PaperBackend {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn fetch_order(&self, session: &Session, id: &str) -> Result<Order, BackendError> {
        let mut st = self.state.lock().await;
        st.counters.fetches += 1;
        st.admit(session)?;
        st.orders
            .get(id)
            .map(|s| s.order.clone())
            .ok_or_else(|| BackendError::NotFound(format!("order {id}")))
    }

    async fn list_orders(
        &self,
        session: &Session,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, BackendError> {
        let mut st = self.state.lock().await;
        st.counters.lists += 1;
        st.admit(session)?;
        Ok(st
            .orders
            .values()
            .map(|s| &s.order)
            .filter(|o| filter.statuses.is_empty() || filter.statuses.contains(&o.order_status))
            .filter(|o| {
                filter
                    .investor_id
                    .as_ref()
                    .map_or(true, |i| *i == o.investor_id)
            })
            .filter(|o| {
                filter
                    .negotiator_id
                    .as_ref()
                    .map_or(true, |n| o.negotiator_id.as_ref() == Some(n))
            })
            .cloned()
            .collect())
    }

    async fn set_order_action(
        &self,
        session: &Session,
        req: &SetActionRequest,
    ) -> Result<ActionAck, BackendError> {
        let mut st = self.state.lock().await;
        st.counters.mutations += 1;
        st.admit(session)?;
        let lost_reply = Self::take_fault(&mut st)?;
        let role = task_role(session, &req.task_id)?;
        let action = wire_action(&req.action, None, None, req.motif.clone())?;
        self.apply(&mut st, role, &req.order_id, &action, false)?;
        match lost_reply {
            Some(e) => Err(e),
            None => Ok(ActionAck {
                success: true,
                message: None,
            }),
        }
    }

    async fn submit_order_result(
        &self,
        session: &Session,
        req: &SubmitResultRequest,
    ) -> Result<ResultAck, BackendError> {
        let mut st = self.state.lock().await;
        st.counters.mutations += 1;
        st.admit(session)?;
        let lost_reply = Self::take_fault(&mut st)?;
        let role = task_role(session, &req.task_id)?;
        let action = wire_action(&req.action, req.quantity, req.price, req.motif.clone())?;
        let residual_order_id = self.apply(&mut st, role, &req.order_id, &action, true)?;
        match lost_reply {
            Some(e) => Err(e),
            None => Ok(ResultAck {
                success: true,
                residual_order_id,
                message: None,
            }),
        }
    }

    async fn change_state(
        &self,
        session: &Session,
        req: &ChangeStateRequest,
    ) -> Result<ActionAck, BackendError> {
        let mut st = self.state.lock().await;
        st.counters.mutations += 1;
        st.admit(session)?;
        let lost_reply = Self::take_fault(&mut st)?;

        let current = st
            .orders
            .get(&req.id)
            .map(|s| s.order.clone())
            .ok_or_else(|| BackendError::NotFound(format!("order {}", req.id)))?;

        // Find the action of the caller's stage that lands on the requested state.
        let candidates = [
            ActionKind::Submit,
            ActionKind::Validate,
            ActionKind::PartialValidate,
            ActionKind::Reject,
            ActionKind::Expire,
            ActionKind::Cancel,
        ];
        let action = candidates
            .into_iter()
            .filter_map(|k| {
                Action::from_parts(k, req.validated_quantity, req.validated_price, None)
            })
            .find(|a| {
                plan_transition(&current, session.role(), a)
                    .map(|p| p.to == req.state)
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                BackendError::Conflict(format!(
                    "role {} cannot move order {} from {} to {}",
                    session.role(), req.id, current.order_status, req.state
                ))
            })?;

        self.apply(&mut st, session.role(), &req.id, &action, false)?;
        match lost_reply {
            Some(e) => Err(e),
            None => Ok(ActionAck {
                success: true,
                message: None,
            }),
        }
    }

    async fn create_order(
        &self,
        session: &Session,
        order: &NewOrder,
    ) -> Result<CreatedOrder, BackendError> {
        let mut st = self.state.lock().await;
        st.counters.creates += 1;
        st.admit(session)?;
        if let Some(e) = st.next_create_fault.take() {
            return Err(e);
        }
        order.validate().map_err(|e| BackendError::Rejected {
            status: 422,
            message: e.to_string(),
        })?;
        Ok(CreatedOrder {
            id: insert_new(&mut st, order),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_order;

    fn session(role: Role) -> Session {
        Session::new("u", role, None, "t")
    }

    #[tokio::test]
    async fn repeated_request_is_refused_after_state_moved() {
        let b = PaperBackend::new();
        b.insert(sample_order("o1", OrderStatus::Pending)).await;
        let req = SetActionRequest {
            order_id: "o1".to_string(),
            task_id: "premiere-validation".to_string(),
            action: "validate".to_string(),
            motif: None,
        };
        let s = session(Role::AgencyFirstValidator);
        assert!(b.set_order_action(&s, &req).await.unwrap().success);
        assert!(matches!(
            b.set_order_action(&s, &req).await,
            Err(BackendError::Conflict(_))
        ));
        assert_eq!(b.version("o1").await, Some(1));
    }

    #[tokio::test]
    async fn task_id_must_match_role() {
        let b = PaperBackend::new();
        b.insert(sample_order("o1", OrderStatus::Pending)).await;
        let req = SetActionRequest {
            order_id: "o1".to_string(),
            task_id: "premiere-validation".to_string(),
            action: "validate".to_string(),
            motif: None,
        };
        assert!(matches!(
            b.set_order_action(&session(Role::TccFirstValidator), &req).await,
            Err(BackendError::Unauthorized(_))
        ));
        assert_eq!(b.order("o1").await.unwrap().order_status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn refused_token_cannot_read_or_write() {
        let b = PaperBackend::new();
        b.insert(sample_order("o1", OrderStatus::Pending)).await;
        b.refuse_token("forged").await;
        let forged = Session::new("u", Role::AgencyFirstValidator, None, "forged");
        assert!(matches!(
            b.fetch_order(&forged, "o1").await,
            Err(BackendError::Unauthorized(_))
        ));
        assert!(matches!(
            b.list_orders(&forged, &OrderFilter::default()).await,
            Err(BackendError::Unauthorized(_))
        ));
        // Other tokens are unaffected.
        assert!(b.fetch_order(&session(Role::Investor), "o1").await.is_ok());
    }

    #[tokio::test]
    async fn idempotency_key_dedups_creation() {
        let b = PaperBackend::new();
        let parent = sample_order("o1", OrderStatus::Ongoing);
        let r = residual_order(&parent, 60, ResidualStatusPolicy::Pending).unwrap();
        let s = session(Role::IobResultSubmitter);
        let a = b.create_order(&s, &r).await.unwrap();
        let c = b.create_order(&s, &r).await.unwrap();
        assert_eq!(a, c);
        assert_eq!(b.residuals_of("o1").await.len(), 1);
    }

    #[tokio::test]
    async fn change_state_finds_matching_action() {
        let b = PaperBackend::new();
        b.insert(sample_order("o1", OrderStatus::InProgress)).await;
        let s = session(Role::AgencyFinalValidator);
        let req = ChangeStateRequest {
            id: "o1".to_string(),
            state: OrderStatus::PartiallyValidated,
            validated_quantity: Some(30),
            validated_price: None,
        };
        assert!(b.change_state(&s, &req).await.unwrap().success);
        let o = b.order("o1").await.unwrap();
        assert_eq!(o.order_status, OrderStatus::PartiallyValidated);
        assert_eq!(o.validated_quantity, Some(30));

        let skip = ChangeStateRequest {
            id: "o1".to_string(),
            state: OrderStatus::Completed,
            validated_quantity: None,
            validated_price: None,
        };
        assert!(matches!(
            b.change_state(&s, &skip).await,
            Err(BackendError::Conflict(_))
        ));
    }
}
