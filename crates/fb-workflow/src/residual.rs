//! Residual orders.
//!
//! A partial validation leaves `quantity - validated_quantity` units
//! unserved. That remainder becomes a new order that copies the parent's
//! instrument, direction, limits, validity and parties verbatim. Its status
//! is reset per backend policy.
//!
//! Creation of the residual is a second write after the parent's status
//! change. When that second write fails, the residual is parked in the
//! [`ResidualLedger`] until an operator retries it. Retries reuse the key
//! from [`residual_key`], so the backend can never create two residuals for
//! one parent. Once creation is confirmed the ledger remembers the residual's
//! id, so a later recovery for the same parent sends nothing.

use std::collections::BTreeMap;

use fb_schemas::{NewOrder, Order, OrderStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Status a freshly created residual order starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResidualStatusPolicy {
    Draft,
    #[default]
    Pending,
}

impl ResidualStatusPolicy {
    pub fn status(self) -> OrderStatus {
        match self {
            ResidualStatusPolicy::Draft => OrderStatus::Draft,
            ResidualStatusPolicy::Pending => OrderStatus::Pending,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" | "0" => Some(ResidualStatusPolicy::Draft),
            "pending" | "1" => Some(ResidualStatusPolicy::Pending),
            _ => None,
        }
    }
}

/// Idempotency key of the residual derived from `parent_order_id`.
///
/// Deterministic: the first attempt and every retry send the same key.
pub fn residual_key(parent_order_id: &str) -> String {
    format!("residual-{parent_order_id}")
}

/// Build the residual order for a partial validation of `parent`.
///
/// Returns `None` when nothing remains (`validated_quantity >= quantity`).
pub fn residual_order(
    parent: &Order,
    validated_quantity: u64,
    policy: ResidualStatusPolicy,
) -> Option<NewOrder> {
    let remaining = parent.quantity.checked_sub(validated_quantity)?;
    if remaining == 0 {
        return None;
    }
    Some(NewOrder {
        order_direction: parent.order_direction,
        security_id: parent.security_id.clone(),
        security_type: parent.security_type,
        security_issuer: parent.security_issuer.clone(),
        market: parent.market(),
        quantity: remaining,
        price_limit_min: parent.price_limit_min,
        price_limit_max: parent.price_limit_max,
        duration: parent.duration,
        validity: parent.validity,
        order_status: policy.status(),
        investor_id: parent.investor_id.clone(),
        negotiator_id: parent.negotiator_id.clone(),
        parent_order_id: Some(parent.id.clone()),
        idempotency_key: Some(residual_key(&parent.id)),
    })
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A residual whose creation has not been confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingResidual {
    pub parent_order_id: String,
    pub order: NewOrder,
    pub last_error: String,
    pub attempts: u32,
}

#[derive(Debug, Default)]
struct Entries {
    pending: BTreeMap<String, PendingResidual>,
    /// parent id -> residual order id
    settled: BTreeMap<String, String>,
}

/// In-memory set of unconfirmed residuals, keyed by parent order id, plus
/// the residuals this process saw created.
#[derive(Debug, Default)]
pub struct ResidualLedger {
    entries: Mutex<Entries>,
}

impl ResidualLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed attempt. A second failure for the same parent bumps
    /// `attempts` and keeps the original payload.
    pub async fn record_failure(&self, parent_order_id: &str, order: NewOrder, error: String) {
        let mut entries = self.entries.lock().await;
        entries
            .pending
            .entry(parent_order_id.to_string())
            .and_modify(|p| {
                p.attempts += 1;
                p.last_error = error.clone();
            })
            .or_insert_with(|| PendingResidual {
                parent_order_id: parent_order_id.to_string(),
                order,
                last_error: error,
                attempts: 1,
            });
    }

    /// The backend confirmed `order_id` as the residual of the parent: drop
    /// any pending entry and remember the id.
    pub async fn settle(&self, parent_order_id: &str, order_id: &str) -> Option<PendingResidual> {
        let mut entries = self.entries.lock().await;
        entries
            .settled
            .insert(parent_order_id.to_string(), order_id.to_string());
        entries.pending.remove(parent_order_id)
    }

    /// Id of the residual already created for the parent, if seen here.
    pub async fn settled(&self, parent_order_id: &str) -> Option<String> {
        self.entries.lock().await.settled.get(parent_order_id).cloned()
    }

    pub async fn get(&self, parent_order_id: &str) -> Option<PendingResidual> {
        self.entries.lock().await.pending.get(parent_order_id).cloned()
    }

    /// Pending snapshot, ordered by parent id.
    pub async fn pending(&self) -> Vec<PendingResidual> {
        self.entries.lock().await.pending.values().cloned().collect()
    }

    /// Number of pending entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.pending.is_empty()
    }
}
