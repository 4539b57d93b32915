//! Command handler modules for fb-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod order;
pub mod residual;
pub mod workflow;

use std::time::Duration;

use anyhow::{Context, Result};
use fb_client::{decode_session, HttpBackendConfig, HttpOrderBackend};
use fb_config::{report_unused_keys, Consumer, ConsoleSettings, UnusedKeyPolicy};
use fb_schemas::OrderStatus;
use fb_workflow::{Role, Session, WorkflowGateway};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// A gateway wired to the configured backend, plus the caller's session.
pub struct Connected {
    pub gateway: WorkflowGateway<HttpOrderBackend>,
    pub session: Session,
}

/// Load layered config, warn about unused keys, resolve the token and
/// build the gateway.
pub fn connect(config_paths: &[String], role_override: Option<&str>) -> Result<Connected> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = fb_config::load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(Consumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS consumer=cli unused_leaf_keys={}",
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
    }

    let settings = ConsoleSettings::from_config_json(&loaded.config_json)?;
    let secrets = fb_config::resolve_api_token(&loaded.config_json, true)?;
    let token = secrets.require_token()?;

    let mut session =
        decode_session(token).with_context(|| format!("UNAUTHORIZED: {}", secrets.token_env))?;
    if let Some(r) = role_override {
        session = session.act_as(parse_role(r)?).context("FORBIDDEN")?;
    }

    let backend = HttpOrderBackend::new(HttpBackendConfig {
        base_url: settings.backend.base_url.clone(),
        graphql_path: settings.backend.graphql_path.clone(),
        timeout: Duration::from_millis(settings.backend.timeout_ms),
    })
    .context("order backend client")?;

    Ok(Connected {
        gateway: WorkflowGateway::new(backend, settings.gateway),
        session,
    })
}

pub fn parse_role(s: &str) -> Result<Role> {
    Role::parse(s).with_context(|| {
        let names: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
        format!("invalid --role '{}'. expected one of: {}", s, names.join(" | "))
    })
}

/// A status given as its code (`2`) or its name (`In_Progress`, any case).
pub fn parse_status(s: &str) -> Result<OrderStatus> {
    let s = s.trim();
    if let Ok(code) = s.parse::<u8>() {
        return Ok(OrderStatus::from_code(code)?);
    }
    OrderStatus::ALL
        .into_iter()
        .find(|st| st.name().eq_ignore_ascii_case(s))
        .with_context(|| format!("unknown order status '{}'", s))
}

/// `In_Progress(2),Cancelled(11)`
pub fn join_statuses(statuses: &[OrderStatus]) -> String {
    statuses
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_by_code_or_name() {
        assert_eq!(parse_status("2").unwrap(), OrderStatus::InProgress);
        assert_eq!(parse_status("partially_validated").unwrap(), OrderStatus::PartiallyValidated);
        assert!(parse_status("12").is_err());
        assert!(parse_status("Done").is_err());
    }

    #[test]
    fn unknown_role_lists_choices() {
        let err = parse_role("trader").unwrap_err().to_string();
        assert!(err.contains("invalid --role 'trader'"));
        assert!(err.contains(Role::Investor.as_str()));
    }
}
