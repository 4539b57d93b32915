//! Order fixtures for scenario tests.

use fb_schemas::{Market, Order, OrderDirection, OrderStatus, SecurityType};

/// A secondary-market stock buy of 100 units, limits 500..=550.
pub fn sample_order(id: &str, status: OrderStatus) -> Order {
    Order {
        id: id.to_string(),
        order_direction: OrderDirection::Buy,
        security_id: "SAIDAL".to_string(),
        security_type: SecurityType::Stock,
        security_issuer: Some("Saidal SPA".to_string()),
        market: Some(Market::Secondary),
        quantity: 100,
        price_limit_min: Some(500_000_000),
        price_limit_max: Some(550_000_000),
        duration: Some(30),
        validity: None,
        order_date: None,
        created_at: None,
        order_status: status,
        investor_id: "inv-1".to_string(),
        negotiator_id: Some("neg-1".to_string()),
        payed_with_card: false,
        validated_quantity: None,
        validated_price: None,
        parent_order_id: None,
    }
}

/// A primary-market subscription (IPO) of 100 units, no price limits.
pub fn sample_subscription(id: &str, status: OrderStatus) -> Order {
    Order {
        security_id: "IPO-ALG-2026".to_string(),
        security_type: SecurityType::Ipo,
        market: Some(Market::Primary),
        price_limit_min: None,
        price_limit_max: None,
        ..sample_order(id, status)
    }
}
