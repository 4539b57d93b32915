//! Scenario: the transition table, exhaustively.
//!
//! For every (role, status, action, market):
//! - a pair outside the table fails with `WorkflowError::Invalid` and the
//!   backend sees no mutation at all;
//! - a pair inside the table lands on exactly the status written below, and
//!   the backend sees exactly one mutation.
//!
//! The expected table is written out here by hand so the test does not
//! share code with the state machine it checks.

use fb_schemas::{Market, OrderStatus};
use fb_testkit::{sample_order, PaperBackend};
use fb_workflow::{
    Action, ActionKind, GatewaySettings, Role, Session, TransitionApi, WorkflowError,
    WorkflowGateway,
};

fn expected(role: Role, from: OrderStatus, kind: ActionKind, market: Market) -> Option<OrderStatus> {
    use ActionKind as A;
    use OrderStatus::*;

    if from.is_terminal() {
        return None;
    }
    if kind == A::Cancel {
        return Some(Cancelled);
    }
    match (role, from, kind) {
        (Role::Investor, Draft, A::Submit) => Some(Pending),

        (Role::AgencyFirstValidator, Pending, A::Validate) => Some(InProgress),
        (Role::AgencyFirstValidator, Pending, A::Reject) => Some(Rejected),

        (Role::AgencyFinalValidator, InProgress, A::Validate) => Some(Validated),
        (Role::AgencyFinalValidator, InProgress, A::PartialValidate) => Some(PartiallyValidated),
        (Role::AgencyFinalValidator, InProgress, A::Reject) => Some(Rejected),

        (Role::TccFirstValidator, Validated, A::Validate) => Some(BeingProcessed),
        (Role::TccFirstValidator, Validated, A::Reject) => Some(Rejected),

        (Role::TccFinalValidator, BeingProcessed, A::Validate) => Some(match market {
            Market::Primary => Completed,
            Market::Secondary => AwaitingApproval,
        }),
        (Role::TccFinalValidator, BeingProcessed, A::Reject) => Some(Rejected),

        (Role::IobExecutor, AwaitingApproval, A::Validate) => Some(Ongoing),

        (Role::IobResultSubmitter, Ongoing, A::Validate) => Some(Completed),
        (Role::IobResultSubmitter, Ongoing, A::PartialValidate) => Some(PartiallyValidated),
        (Role::IobResultSubmitter, Ongoing, A::Expire) => Some(Expired),
        (Role::IobResultSubmitter, Ongoing, A::Reject) => Some(Rejected),

        _ => None,
    }
}

fn action_for(kind: ActionKind) -> Action {
    match kind {
        ActionKind::Submit => Action::Submit,
        ActionKind::Validate => Action::Validate,
        ActionKind::PartialValidate => Action::PartialValidate {
            quantity: 60,
            price: Some(520_000_000),
        },
        ActionKind::Reject => Action::Reject {
            motif: Some("dossier incomplet".to_string()),
        },
        ActionKind::Cancel => Action::Cancel { motif: None },
        ActionKind::Expire => Action::Expire,
    }
}

const KINDS: [ActionKind; 6] = [
    ActionKind::Submit,
    ActionKind::Validate,
    ActionKind::PartialValidate,
    ActionKind::Reject,
    ActionKind::Cancel,
    ActionKind::Expire,
];

async fn run_grid(api: TransitionApi) {
    let mut legal = 0;
    for market in [Market::Primary, Market::Secondary] {
        for role in Role::ALL {
            for from in OrderStatus::ALL {
                for kind in KINDS {
                    let mut order = sample_order("ord-1", from);
                    order.market = Some(market);

                    let backend = PaperBackend::new();
                    backend.insert(order.clone()).await;
                    let settings = GatewaySettings {
                        api,
                        ..GatewaySettings::default()
                    };
                    let gw = WorkflowGateway::new(backend, settings);
                    let session = Session::new("u-1", role, None, "tok");

                    let res = gw
                        .request_transition(&session, &order, &action_for(kind))
                        .await;
                    let counters = gw.backend().counters().await;
                    let ctx = format!("{api:?} {market:?} {role} {from} {kind}");

                    match expected(role, from, kind, market) {
                        None => {
                            assert!(
                                matches!(res, Err(WorkflowError::Invalid(_))),
                                "{ctx}: expected local refusal, got {res:?}"
                            );
                            assert_eq!(counters.mutations, 0, "{ctx}: no request may be sent");
                            assert_eq!(counters.fetches, 0, "{ctx}: no read either");
                        }
                        Some(to) => {
                            legal += 1;
                            let out = res.unwrap_or_else(|e| panic!("{ctx}: {e}"));
                            assert_eq!(out.to, to, "{ctx}");
                            assert_eq!(counters.mutations, 1, "{ctx}");
                            let stored = gw.backend().order("ord-1").await.unwrap();
                            assert_eq!(stored.order_status, to, "{ctx}: backend status");
                        }
                    }
                }
            }
        }
    }
    // 8 cancels x 7 roles + 15 stage moves, on each market.
    assert_eq!(legal, 2 * (8 * 7 + 15));
}

#[tokio::test]
async fn grid_over_task_actions() {
    run_grid(TransitionApi::TaskActions).await;
}

#[tokio::test]
async fn grid_over_changestate() {
    run_grid(TransitionApi::ChangeState).await;
}
