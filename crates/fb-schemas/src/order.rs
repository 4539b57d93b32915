use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::status::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Primary,
    Secondary,
}

/// Instrument classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityType {
    Stock,
    Bond,
    Sukuk,
    ParticipativeTitle,
    Ipo,
    BondIssue,
}

impl SecurityType {
    /// Market an instrument of this type trades on when the backend does not
    /// say otherwise. IPOs and bond issues are subscriptions.
    pub fn default_market(self) -> Market {
        match self {
            SecurityType::Ipo | SecurityType::BondIssue => Market::Primary,
            _ => Market::Secondary,
        }
    }
}

/// One buy/sell instruction (secondary market) or subscription (primary market)
/// as returned by the order backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub order_direction: OrderDirection,
    pub security_id: String,
    pub security_type: SecurityType,
    #[serde(default)]
    pub security_issuer: Option<String>,
    /// Absent on older backend records; read through [`Order::market`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<Market>,
    pub quantity: u64,
    /// Micros.
    #[serde(default, with = "crate::prices::opt_price", skip_serializing_if = "Option::is_none")]
    pub price_limit_min: Option<i64>,
    /// Micros.
    #[serde(default, with = "crate::prices::opt_price", skip_serializing_if = "Option::is_none")]
    pub price_limit_max: Option<i64>,
    /// Validity duration in days.
    #[serde(default)]
    pub duration: Option<u32>,
    /// Last day the order may still be executed.
    #[serde(default)]
    pub validity: Option<NaiveDate>,
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub order_status: OrderStatus,
    pub investor_id: String,
    #[serde(default)]
    pub negotiator_id: Option<String>,
    /// Only meaningful while the order is a draft.
    #[serde(default)]
    pub payed_with_card: bool,
    #[serde(default)]
    pub validated_quantity: Option<u64>,
    /// Micros.
    #[serde(default, with = "crate::prices::opt_price", skip_serializing_if = "Option::is_none")]
    pub validated_price: Option<i64>,
    /// Set on a residual order: the order whose remainder it carries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_order_id: Option<String>,
}

impl Order {
    /// The recorded market, or the security type's default when the backend
    /// left it out.
    pub fn market(&self) -> Market {
        self.market
            .unwrap_or_else(|| self.security_type.default_market())
    }

    /// Check the record-level invariants.
    pub fn validate(&self) -> Result<(), OrderInvariantError> {
        check_quantity_and_limits(self.quantity, self.price_limit_min, self.price_limit_max)?;
        if let Some(vq) = self.validated_quantity {
            if vq > self.quantity {
                return Err(OrderInvariantError::ValidatedQuantityExceeds {
                    validated: vq,
                    quantity: self.quantity,
                });
            }
        }
        Ok(())
    }

    /// `payed_with_card` as displayed: ignored outside of `Draft`.
    pub fn card_payment_applies(&self) -> bool {
        self.payed_with_card && self.order_status == OrderStatus::Draft
    }

    /// `true` once `today` is past the validity date.
    pub fn is_past_validity(&self, today: NaiveDate) -> bool {
        self.validity.map(|v| today > v).unwrap_or(false)
    }
}

/// Creation payload for a new order. Ids and timestamps are assigned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub order_direction: OrderDirection,
    pub security_id: String,
    pub security_type: SecurityType,
    #[serde(default)]
    pub security_issuer: Option<String>,
    pub market: Market,
    pub quantity: u64,
    #[serde(default, with = "crate::prices::opt_price", skip_serializing_if = "Option::is_none")]
    pub price_limit_min: Option<i64>,
    #[serde(default, with = "crate::prices::opt_price", skip_serializing_if = "Option::is_none")]
    pub price_limit_max: Option<i64>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub validity: Option<NaiveDate>,
    pub order_status: OrderStatus,
    pub investor_id: String,
    #[serde(default)]
    pub negotiator_id: Option<String>,
    /// Set when this order carries the unvalidated remainder of another order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_order_id: Option<String>,
    /// Backend-side dedup key; the same key never creates two orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), OrderInvariantError> {
        check_quantity_and_limits(self.quantity, self.price_limit_min, self.price_limit_max)
    }
}

fn check_quantity_and_limits(
    quantity: u64,
    min: Option<i64>,
    max: Option<i64>,
) -> Result<(), OrderInvariantError> {
    if quantity == 0 {
        return Err(OrderInvariantError::NonPositiveQuantity);
    }
    for limit in [min, max].into_iter().flatten() {
        if limit < 0 {
            return Err(OrderInvariantError::NegativePriceLimit(limit));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(OrderInvariantError::InvertedPriceLimits { min, max });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderInvariantError {
    NonPositiveQuantity,
    /// Micros.
    NegativePriceLimit(i64),
    InvertedPriceLimits { min: i64, max: i64 },
    ValidatedQuantityExceeds { validated: u64, quantity: u64 },
}

impl std::fmt::Display for OrderInvariantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderInvariantError::NonPositiveQuantity => write!(f, "quantity must be positive"),
            OrderInvariantError::NegativePriceLimit(m) => {
                write!(f, "price limit must be non-negative (got {m} micros)")
            }
            OrderInvariantError::InvertedPriceLimits { min, max } => {
                write!(f, "price limit min {min} exceeds max {max} (micros)")
            }
            OrderInvariantError::ValidatedQuantityExceeds {
                validated,
                quantity,
            } => write!(
                f,
                "validated quantity {validated} exceeds order quantity {quantity}"
            ),
        }
    }
}

impl std::error::Error for OrderInvariantError {}
