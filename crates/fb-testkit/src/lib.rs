//! fb-testkit
//!
//! In-memory [`PaperBackend`] implementing `fb_workflow::OrderBackend`, plus
//! order fixtures. Scenario tests under `tests/` drive the real
//! `WorkflowGateway` against it.

pub mod fixtures;
mod paper_backend;

pub use fixtures::{sample_order, sample_subscription};
pub use paper_backend::{CallCounters, Fault, PaperBackend};
