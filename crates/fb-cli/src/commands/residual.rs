//! `fb residual retry`.
//!
//! The CLI holds no ledger across invocations, so it re-derives the residual
//! from the parent order and first looks for an existing order carrying the
//! parent's remainder. Only when none is found does it create one, under
//! `residual-{parent}`.

use anyhow::{bail, Result};
use fb_workflow::ResidualRetry;

use super::connect;

pub async fn retry(config_paths: &[String], role: Option<&str>, parent: &str) -> Result<()> {
    let c = connect(config_paths, role)?;
    match c.gateway.recover_residual(&c.session, parent).await? {
        None => {
            println!("residual_owed=false parent_order_id={}", parent);
        }
        Some(ResidualRetry::Created {
            parent_order_id,
            order_id,
        }) => {
            println!(
                "residual_created=true parent_order_id={} residual_order_id={}",
                parent_order_id, order_id
            );
        }
        Some(ResidualRetry::AlreadyCreated {
            parent_order_id,
            order_id,
        }) => {
            println!(
                "residual_created=false already_exists=true parent_order_id={} residual_order_id={}",
                parent_order_id, order_id
            );
        }
        Some(ResidualRetry::Failed {
            parent_order_id,
            attempts,
            error,
        }) => {
            bail!(
                "RESIDUAL_PENDING: parent_order_id={} attempts={} error={}",
                parent_order_id,
                attempts,
                error
            );
        }
    }
    Ok(())
}
