//! Request and response types for all fb-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use fb_schemas::OrderStatus;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    /// Backend implementation behind the gateway ("http" | "paper").
    pub backend: String,
}

// ---------------------------------------------------------------------------
// /v1/orders/{id}
// ---------------------------------------------------------------------------

/// `?role=` lets a user holding several stages pick the one to act as.
/// A stage the token does not grant is refused with 403.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleQuery {
    #[serde(default)]
    pub role: Option<String>,
}

/// Body of `POST /v1/orders/{id}/transition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    /// submit | validate | partial | reject | cancel | expire
    pub action: String,
    /// Validated quantity, partial only.
    #[serde(default)]
    pub quantity: Option<u64>,
    /// Validated price in currency units.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub motif: Option<String>,
    /// Stage to act as; must be granted by the token.
    #[serde(default)]
    pub role: Option<String>,
    /// Status the caller's screen showed. A mismatch with the backend is
    /// refused as a conflict before anything is sent.
    #[serde(default)]
    pub expected_status: Option<OrderStatus>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// transition_invalid | unauthorized | forbidden | conflict | outcome_unknown |
    /// not_found | backend | bad_request | not_configured | invalid_actor
    pub kind: String,
    /// Authoritative status after a conflict or an ambiguous outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<OrderStatus>,
}
