//! Scenario: the backend is the authority.
//!
//! - A stale view (someone else moved the order) passes the local check but
//!   is refused by the backend; the gateway re-reads and reports the real
//!   status. It does not retry.
//! - A repeated identical request is refused: the source status has already
//!   moved on.
//! - A lost reply is reported as ambiguous with the re-read status, and the
//!   mutation is not sent again.
//! - An expired token surfaces as `Unauthorized`.

use fb_schemas::OrderStatus;
use fb_testkit::{sample_order, Fault, PaperBackend};
use fb_workflow::{Action, BackendError, GatewaySettings, Role, Session, WorkflowError, WorkflowGateway};

fn session(role: Role) -> Session {
    Session::new("u-1", role, None, "tok")
}

async fn gateway_with(order: fb_schemas::Order) -> WorkflowGateway<PaperBackend> {
    let backend = PaperBackend::new();
    backend.insert(order).await;
    WorkflowGateway::new(backend, GatewaySettings::default())
}

#[tokio::test]
async fn stale_view_gets_conflict_with_current_status() {
    let view = sample_order("ord-1", OrderStatus::Pending);
    let gw = gateway_with(view.clone()).await;
    gw.backend().force_status("ord-1", OrderStatus::Cancelled).await;

    let err = gw
        .request_transition(&session(Role::AgencyFirstValidator), &view, &Action::Validate)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict { .. }), "{err}");
    assert_eq!(err.current_status(), Some(OrderStatus::Cancelled));

    let c = gw.backend().counters().await;
    assert_eq!(c.mutations, 1, "exactly one attempt");
    assert_eq!(c.fetches, 1, "one authoritative re-read");
}

#[tokio::test]
async fn repeated_identical_request_is_refused() {
    let view = sample_order("ord-1", OrderStatus::Pending);
    let gw = gateway_with(view.clone()).await;
    let s = session(Role::AgencyFirstValidator);

    gw.request_transition(&s, &view, &Action::Validate).await.unwrap();
    // Same stale view, same request: as after a client-side retry.
    let err = gw.request_transition(&s, &view, &Action::Validate).await.unwrap_err();
    assert_eq!(err.current_status(), Some(OrderStatus::InProgress));
    assert_eq!(gw.backend().version("ord-1").await, Some(1));
}

#[tokio::test]
async fn lost_reply_is_ambiguous_and_not_retried() {
    let view = sample_order("ord-1", OrderStatus::AwaitingApproval);
    let gw = gateway_with(view.clone()).await;
    gw.backend()
        .fail_next_mutation(Fault::ApplyThenFail(BackendError::Transport(
            "connection reset".to_string(),
        )))
        .await;

    let err = gw
        .request_transition(&session(Role::IobExecutor), &view, &Action::Validate)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Ambiguous { .. }), "{err}");
    assert_eq!(err.current_status(), Some(OrderStatus::Ongoing));
    assert_eq!(gw.backend().counters().await.mutations, 1);
}

#[tokio::test]
async fn failed_request_leaves_order_untouched() {
    let view = sample_order("ord-1", OrderStatus::AwaitingApproval);
    let gw = gateway_with(view.clone()).await;
    gw.backend()
        .fail_next_mutation(Fault::Fail(BackendError::Transport("timeout".to_string())))
        .await;

    let err = gw
        .request_transition(&session(Role::IobExecutor), &view, &Action::Validate)
        .await
        .unwrap_err();
    assert_eq!(err.current_status(), Some(OrderStatus::AwaitingApproval));
    assert_eq!(gw.backend().version("ord-1").await, Some(0));
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let view = sample_order("ord-1", OrderStatus::Pending);
    let gw = gateway_with(view.clone()).await;
    gw.backend()
        .fail_next_mutation(Fault::Fail(BackendError::Unauthorized("jwt expired".to_string())))
        .await;

    let err = gw
        .request_transition(&session(Role::AgencyFirstValidator), &view, &Action::Validate)
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::Unauthorized("jwt expired".to_string()));
}
