//! Shared runtime state for fb-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The daemon holds no
//! order data of its own: every read and write goes through the gateway to
//! the backend. The residual ledger inside the gateway is the only thing
//! that lives here across requests.

use std::sync::Arc;
use std::time::Duration;

use fb_client::{ActorClient, InstitutionCache};
use fb_schemas::OrderStatus;
use fb_workflow::{
    ActionKind, GatewaySettings, OrderBackend, ResidualOutcome, Role, TransitionOutcome,
    WorkflowGateway,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// The backend behind the gateway: HTTP in production, paper in tests.
pub type SharedBackend = Arc<dyn OrderBackend>;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Transition(TransitionEvent),
    ResidualPending {
        parent_order_id: String,
        quantity: u64,
        error: String,
    },
    LogLine { level: String, msg: String },
}

/// A transition the backend accepted, as announced to subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub order_id: String,
    pub subject: String,
    pub role: Role,
    pub action: ActionKind,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub residual: Option<ResidualOutcome>,
}

impl TransitionEvent {
    pub fn new(subject: &str, out: &TransitionOutcome) -> Self {
        Self {
            order_id: out.order_id.clone(),
            subject: subject.to_string(),
            role: out.role,
            action: out.action,
            from: out.from,
            to: out.to,
            residual: out.residual.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Actor reference data access, when an actor backend is configured.
pub struct Actors {
    pub client: ActorClient,
    pub institutions: InstitutionCache,
}

/// Shared across all Axum handlers behind one `Arc`.
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    pub gateway: WorkflowGateway<SharedBackend>,
    pub actors: Option<Actors>,
}

impl AppState {
    pub fn new(backend: SharedBackend, settings: GatewaySettings, event_buffer: usize) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(event_buffer.max(1));
        Self {
            bus,
            build: BuildInfo {
                service: "fb-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            gateway: WorkflowGateway::new(backend, settings),
            actors: None,
        }
    }

    pub fn with_actors(mut self, client: ActorClient, ttl: Duration) -> Self {
        self.actors = Some(Actors {
            client,
            institutions: InstitutionCache::new(ttl),
        });
        self
    }

    /// Announce an accepted transition. A send with no subscriber is fine.
    pub fn publish_transition(&self, subject: &str, out: &TransitionOutcome) {
        let _ = self
            .bus
            .send(BusMsg::Transition(TransitionEvent::new(subject, out)));
        if let Some(ResidualOutcome::Pending {
            parent_order_id,
            quantity,
            error,
        }) = &out.residual
        {
            let _ = self.bus.send(BusMsg::ResidualPending {
                parent_order_id: parent_order_id.clone(),
                quantity: *quantity,
                error: error.clone(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
