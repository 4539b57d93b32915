//! fb-schemas
//!
//! Shared data model for the FinnBourse order workflow: orders, the canonical
//! status codes, actor reference records and the JSON shapes exchanged with
//! the order backend. No business logic lives here beyond the record-level
//! invariants each type can check on itself.

pub mod actors;
pub mod order;
pub mod prices;
pub mod status;
pub mod wire;

pub use actors::{ActorKind, ActorRecord, ActorStatus, ActorValidationError, Address, Contact};
pub use order::{
    Market, NewOrder, Order, OrderDirection, OrderInvariantError, SecurityType,
};
pub use prices::{micros_to_price, price_to_micros, PricingError, MICROS_PER_UNIT};
pub use status::{OrderStatus, UnknownStatusCode};
pub use wire::{
    ActionAck, ChangeStateRequest, CreatedOrder, OrderFilter, ResultAck, SetActionRequest,
    SubmitResultRequest,
};
