//! `fb workflow table`: the transition table, no backend needed.

use anyhow::{Context, Result};
use fb_workflow::transition_table;

use super::join_statuses;

pub fn table(json: bool) -> Result<()> {
    let rows = transition_table();
    if json {
        let s = serde_json::to_string_pretty(&rows).context("serialize transition table")?;
        println!("{}", s);
        return Ok(());
    }
    for r in &rows {
        println!(
            "role={} task_id={} sources={} targets={}",
            r.role,
            r.task_id,
            join_statuses(&r.sources),
            join_statuses(&r.targets)
        );
    }
    Ok(())
}
