//! fb-workflow
//!
//! Order lifecycle workflow for the FinnBourse back-office client.
//!
//! - `oms` holds the status state machine: roles, actions, the transition
//!   table and the pure `plan_transition` check.
//! - `residual` derives the follow-up order for an unvalidated remainder and
//!   keeps the ledger of residuals whose creation has not been confirmed.
//! - `WorkflowGateway` is the only public path that sends a transition to the
//!   backend. Every request is planned locally first; an illegal request never
//!   reaches the network.
//!
//! The backend owns the orders and remains the authority: the gateway never
//! retries a mutation on its own and re-reads the order after any refusal or
//! ambiguous failure.

mod backend;
mod gateway;
pub mod oms;
pub mod residual;

pub use backend::{BackendError, OrderBackend, RoleNotHeld, Session};
pub use gateway::{
    GatewaySettings, ResidualOutcome, ResidualRetry, TransitionApi, TransitionOutcome,
    WorkflowError, WorkflowGateway,
};
pub use oms::state_machine::{
    allowed_sources, allowed_targets, available_actions, available_actions_on, plan_transition,
    plan_transition_on, transition_table, OrderView, PlannedTransition, TableRow,
    TransitionError,
};
pub use oms::{Action, ActionKind, Role};
pub use residual::{residual_key, residual_order, PendingResidual, ResidualLedger, ResidualStatusPolicy};
