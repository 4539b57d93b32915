//! fb-client
//!
//! HTTP side of the FinnBourse console:
//! - [`HttpOrderBackend`] implements `fb_workflow::OrderBackend` over the
//!   order REST endpoints and the `listOrdersExtended` GraphQL query;
//! - [`ActorClient`] maps the actor reference endpoints, with an
//!   [`InstitutionCache`] in front of the institution list;
//! - [`decode_session`] turns the bearer JWT into a `Session`.
//!
//! Status mapping: 401/403 → `Unauthorized`, 404 → `NotFound`,
//! 409 → `Conflict`, other 4xx → `Rejected`, 5xx and transport failures →
//! `Transport` (outcome unknown). Nothing here retries.

mod actors;
mod graphql;
mod http;
mod session;

pub use actors::{ActorClient, InstitutionCache};
pub use http::{HttpBackendConfig, HttpOrderBackend};
pub use session::{decode_session, decode_session_at, SessionError};
