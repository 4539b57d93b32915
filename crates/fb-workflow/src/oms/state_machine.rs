//! Order status state machine.
//!
//! # Transition table
//!
//! ```text
//!  role                     source          action            target
//!  ───────────────────────  ──────────────  ────────────────  ─────────────────────────
//!  investor                 Draft(0)        submit            Pending(1)
//!  agency-first-validator   Pending(1)      validate/reject   In_Progress(2)/Rejected(10)
//!  agency-final-validator   In_Progress(2)  validate          Validated(3)
//!                                           partial           Partially_Validated(8)
//!                                           reject            Rejected(10)
//!  tcc-first-validator      Validated(3)    validate/reject   Being_Processed(4)/Rejected(10)
//!  tcc-final-validator      Being_Proc.(4)  validate          Completed(5)         primary market
//!                                                             Awaiting_Approval(6) secondary market
//!                                           reject            Rejected(10)
//!  iob-executor             Awaiting_Ap.(6) validate          Ongoing(7)
//!  iob-result-submitter     Ongoing(7)      validate          Completed(5)
//!                                           partial           Partially_Validated(8)
//!                                           expire            Expired(9)
//!                                           reject            Rejected(10)
//!  any role                 non-terminal    cancel            Cancelled(11)
//! ```
//!
//! Terminal states (5, 9, 10, 11) admit nothing, cancel included. Expire is
//! refused while the order is still inside its validity date.
//!
//! [`plan_transition_on`] is pure: it decides whether a request is legal and
//! what it would produce as of a given day. [`plan_transition`] is the same
//! check as of today. Neither performs I/O, so callers can reject an illegal
//! request before anything reaches the network.

use chrono::NaiveDate;
use fb_schemas::{Market, Order, OrderInvariantError, OrderStatus};
use serde::{Deserialize, Serialize};

use super::{Action, ActionKind, Role};

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Statuses a role may act on (cancel aside).
pub fn allowed_sources(role: Role) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match role {
        Role::Investor => &[Draft],
        Role::AgencyFirstValidator => &[Pending],
        Role::AgencyFinalValidator => &[InProgress],
        Role::TccFirstValidator => &[Validated],
        Role::TccFinalValidator => &[BeingProcessed],
        Role::IobExecutor => &[AwaitingApproval],
        Role::IobResultSubmitter => &[Ongoing],
    }
}

/// Target of a stage action for a given market, `None` if the role cannot
/// take that action at all.
///
/// Two rows differ from the bare stage table (`tcc-final {4} -> {5, 10}`,
/// `iob-executor {5 or 6} -> {7}`):
/// - tcc-final-validator's validate on a secondary-market order goes
///   Being_Processed(4) -> Awaiting_Approval(6), handing it to the IOB;
///   only primary-market orders complete (5) at this stage.
/// - iob-executor acts on Awaiting_Approval(6) only ([`allowed_sources`]).
///   A Completed(5) order is terminal and nothing reaches the IOB there.
fn stage_target(role: Role, kind: ActionKind, market: Market) -> Option<OrderStatus> {
    use ActionKind as A;
    use OrderStatus::*;
    let target = match (role, kind) {
        (Role::Investor, A::Submit) => Pending,

        (Role::AgencyFirstValidator, A::Validate) => InProgress,
        (Role::AgencyFirstValidator, A::Reject) => Rejected,

        (Role::AgencyFinalValidator, A::Validate) => Validated,
        (Role::AgencyFinalValidator, A::PartialValidate) => PartiallyValidated,
        (Role::AgencyFinalValidator, A::Reject) => Rejected,

        (Role::TccFirstValidator, A::Validate) => BeingProcessed,
        (Role::TccFirstValidator, A::Reject) => Rejected,

        (Role::TccFinalValidator, A::Validate) => match market {
            Market::Primary => Completed,
            Market::Secondary => AwaitingApproval,
        },
        (Role::TccFinalValidator, A::Reject) => Rejected,

        (Role::IobExecutor, A::Validate) => Ongoing,

        (Role::IobResultSubmitter, A::Validate) => Completed,
        (Role::IobResultSubmitter, A::PartialValidate) => PartiallyValidated,
        (Role::IobResultSubmitter, A::Expire) => Expired,
        (Role::IobResultSubmitter, A::Reject) => Rejected,

        _ => return None,
    };
    Some(target)
}

const STAGE_ACTIONS: [ActionKind; 5] = [
    ActionKind::Submit,
    ActionKind::Validate,
    ActionKind::PartialValidate,
    ActionKind::Reject,
    ActionKind::Expire,
];

/// Every status a role can ever set, cancel included, across both markets.
pub fn allowed_targets(role: Role) -> Vec<OrderStatus> {
    let mut out: Vec<OrderStatus> = STAGE_ACTIONS
        .iter()
        .flat_map(|k| {
            [Market::Primary, Market::Secondary]
                .into_iter()
                .filter_map(move |m| stage_target(role, *k, m))
        })
        .collect();
    out.push(OrderStatus::Cancelled);
    out.sort();
    out.dedup();
    out
}

/// One printable row of the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub role: Role,
    pub task_id: String,
    pub sources: Vec<OrderStatus>,
    pub targets: Vec<OrderStatus>,
}

pub fn transition_table() -> Vec<TableRow> {
    Role::ALL
        .into_iter()
        .map(|role| TableRow {
            role,
            task_id: role.task_id().to_string(),
            sources: allowed_sources(role).to_vec(),
            targets: allowed_targets(role),
        })
        .collect()
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// `true` while the order has a validity date that `today` has not passed.
fn still_valid(order: &Order, today: NaiveDate) -> bool {
    order.validity.is_some() && !order.is_past_validity(today)
}

/// Actions legal for `role` on `order` in its current status, as of today.
pub fn available_actions(order: &Order, role: Role) -> Vec<ActionKind> {
    available_actions_on(order, role, today())
}

pub fn available_actions_on(order: &Order, role: Role, today: NaiveDate) -> Vec<ActionKind> {
    let status = order.order_status;
    if status.is_terminal() {
        return Vec::new();
    }
    let mut out = Vec::new();
    if allowed_sources(role).contains(&status) {
        for kind in STAGE_ACTIONS {
            if stage_target(role, kind, order.market()).is_some() {
                // A partial validation needs at least two units to split.
                if kind == ActionKind::PartialValidate && order.quantity < 2 {
                    continue;
                }
                if kind == ActionKind::Expire && still_valid(order, today) {
                    continue;
                }
                out.push(kind);
            }
        }
    }
    out.push(ActionKind::Cancel);
    out
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// Why a transition request was refused locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The order is in a terminal state.
    Terminal { status: OrderStatus },
    /// The role is not authorized to act on orders in this status.
    RoleNotAllowed { role: Role, status: OrderStatus },
    /// The role may act on this status but not with this action.
    ActionNotAllowed {
        role: Role,
        status: OrderStatus,
        action: ActionKind,
    },
    /// Partial validation quantity must satisfy `0 < validated < quantity`.
    PartialQuantityOutOfRange { validated: u64, quantity: u64 },
    /// Validated price (micros) is negative or outside the order's limits.
    PriceOutsideLimits {
        price: i64,
        min: Option<i64>,
        max: Option<i64>,
    },
    /// Expire requested before the validity date has passed.
    NotYetExpired { validity: NaiveDate },
    /// The order record itself violates an invariant.
    InvalidOrder(OrderInvariantError),
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::Terminal { status } => {
                write!(f, "order is in terminal state {status}; no transition allowed")
            }
            TransitionError::RoleNotAllowed { role, status } => {
                write!(f, "role {role} cannot act on orders in state {status}")
            }
            TransitionError::ActionNotAllowed {
                role,
                status,
                action,
            } => write!(f, "role {role} cannot {action} an order in state {status}"),
            TransitionError::PartialQuantityOutOfRange {
                validated,
                quantity,
            } => write!(
                f,
                "partial validation quantity {validated} must be between 1 and {} (order quantity {quantity})",
                quantity.saturating_sub(1)
            ),
            TransitionError::PriceOutsideLimits { price, min, max } => write!(
                f,
                "validated price {price} micros is outside limits [{}, {}]",
                min.map(|m| m.to_string()).unwrap_or_else(|| "0".to_string()),
                max.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string())
            ),
            TransitionError::NotYetExpired { validity } => {
                write!(f, "order is valid until {validity}; it cannot expire yet")
            }
            TransitionError::InvalidOrder(e) => write!(f, "invalid order: {e}"),
        }
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// A transition that passed every local check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransition {
    pub order_id: String,
    pub role: Role,
    pub action: Action,
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Quantity left for a residual order, set only for partial validations.
    pub residual_quantity: Option<u64>,
}

impl PlannedTransition {
    pub fn validated_quantity(&self) -> Option<u64> {
        match self.action {
            Action::PartialValidate { quantity, .. } => Some(quantity),
            _ => None,
        }
    }

    pub fn validated_price(&self) -> Option<i64> {
        match self.action {
            Action::PartialValidate { price, .. } => price,
            _ => None,
        }
    }
}

/// Decide whether `role` may apply `action` to `order` as it stands today.
///
/// # Errors
/// Returns [`TransitionError`] for every request outside the transition table.
pub fn plan_transition(
    order: &Order,
    role: Role,
    action: &Action,
) -> Result<PlannedTransition, TransitionError> {
    plan_transition_on(order, role, action, today())
}

/// [`plan_transition`] as of `today`.
pub fn plan_transition_on(
    order: &Order,
    role: Role,
    action: &Action,
    today: NaiveDate,
) -> Result<PlannedTransition, TransitionError> {
    order.validate().map_err(TransitionError::InvalidOrder)?;

    let from = order.order_status;
    if from.is_terminal() {
        return Err(TransitionError::Terminal { status: from });
    }

    let kind = action.kind();
    let to = if kind == ActionKind::Cancel {
        OrderStatus::Cancelled
    } else {
        if !allowed_sources(role).contains(&from) {
            return Err(TransitionError::RoleNotAllowed { role, status: from });
        }
        stage_target(role, kind, order.market()).ok_or(TransitionError::ActionNotAllowed {
            role,
            status: from,
            action: kind,
        })?
    };

    if kind == ActionKind::Expire && still_valid(order, today) {
        if let Some(validity) = order.validity {
            return Err(TransitionError::NotYetExpired { validity });
        }
    }

    let mut residual_quantity = None;
    if let Action::PartialValidate { quantity, price } = action {
        if *quantity == 0 || *quantity >= order.quantity {
            return Err(TransitionError::PartialQuantityOutOfRange {
                validated: *quantity,
                quantity: order.quantity,
            });
        }
        if let Some(p) = price {
            check_price(*p, order)?;
        }
        residual_quantity = Some(order.quantity - quantity);
    }

    Ok(PlannedTransition {
        order_id: order.id.clone(),
        role,
        action: action.clone(),
        from,
        to,
        residual_quantity,
    })
}

fn check_price(price: i64, order: &Order) -> Result<(), TransitionError> {
    let below = price < 0 || order.price_limit_min.map(|m| price < m).unwrap_or(false);
    let above = order.price_limit_max.map(|m| price > m).unwrap_or(false);
    if below || above {
        return Err(TransitionError::PriceOutsideLimits {
            price,
            min: order.price_limit_min,
            max: order.price_limit_max,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// OrderView
// ---------------------------------------------------------------------------

/// What a caller with a given role sees of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub order: Order,
    pub status_code: u8,
    pub status_name: String,
    pub status_label: String,
    pub terminal: bool,
    pub role: Role,
    pub actions: Vec<ActionKind>,
    /// Card payment as displayed; only a draft carries it.
    #[serde(default)]
    pub card_payment: bool,
}

impl OrderView {
    pub fn of(order: Order, role: Role) -> Self {
        let status = order.order_status;
        let actions = available_actions(&order, role);
        Self {
            card_payment: order.card_payment_applies(),
            status_code: status.code(),
            status_name: status.name().to_string(),
            status_label: status.label().to_string(),
            terminal: status.is_terminal(),
            role,
            actions,
            order,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
