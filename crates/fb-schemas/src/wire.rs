//! Request and response bodies of the order-transition contract.

use serde::{Deserialize, Serialize};

use crate::status::OrderStatus;

/// `POST /order/set-action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActionRequest {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "taskID")]
    pub task_id: String,
    /// `validate` | `reject` | `cancel` | `submit`
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motif: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /order/submit-order-result`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResultRequest {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "taskID")]
    pub task_id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
    /// Micros.
    #[serde(default, with = "crate::prices::opt_price", skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motif: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultAck {
    pub success: bool,
    /// Present when the backend created the residual order itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /orders/changestate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStateRequest {
    pub id: String,
    pub state: OrderStatus,
    #[serde(rename = "validatedQuantity", default, skip_serializing_if = "Option::is_none")]
    pub validated_quantity: Option<u64>,
    /// Micros. The backend spells this field in lowercase.
    #[serde(
        rename = "validatedprice",
        default,
        with = "crate::prices::opt_price",
        skip_serializing_if = "Option::is_none"
    )]
    pub validated_price: Option<i64>,
}

/// Body returned by `POST /order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub id: String,
}

/// Variables of the `listOrdersExtended` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negotiator_id: Option<String>,
}
