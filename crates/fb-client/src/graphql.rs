//! `listOrdersExtended` over GraphQL.

use fb_schemas::{Order, OrderFilter};
use fb_workflow::BackendError;
use serde::{Deserialize, Serialize};

pub(crate) const LIST_ORDERS_QUERY: &str = "\
query ListOrdersExtended($statuses: [Int!], $investorId: String, $negotiatorId: String) {
  listOrdersExtended(statuses: $statuses, investorId: $investorId, negotiatorId: $negotiatorId) {
    id orderDirection securityId securityType securityIssuer market quantity
    priceLimitMin priceLimitMax duration validity orderDate createdAt orderStatus
    investorId negotiatorId payedWithCard validatedQuantity validatedPrice parentOrderId
  }
}";

#[derive(Debug, Serialize)]
pub(crate) struct GraphqlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub variables: V,
}

pub(crate) fn list_orders_request(filter: &OrderFilter) -> GraphqlRequest<'static, &OrderFilter> {
    GraphqlRequest {
        query: LIST_ORDERS_QUERY,
        variables: filter,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

impl<T> GraphqlResponse<T> {
    /// GraphQL reports failures with HTTP 200; the `errors` array wins over
    /// any partial `data`.
    pub fn into_data(self) -> Result<T, BackendError> {
        if let Some(first) = self.errors.first() {
            let message = self
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            let lower = first.message.to_ascii_lowercase();
            if lower.contains("unauthorized") || lower.contains("unauthenticated") {
                return Err(BackendError::Unauthorized(message));
            }
            return Err(BackendError::Rejected {
                status: 200,
                message,
            });
        }
        self.data
            .ok_or_else(|| BackendError::Decode("graphql response without data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListOrdersData {
    pub list_orders_extended: Vec<Order>,
}
