//! Typed view of the merged config.
//!
//! ```yaml
//! backend:
//!   base_url: "http://127.0.0.1:8080"
//!   graphql_path: "/graphql"
//!   timeout_ms: 10000
//! workflow:
//!   transition_api: task-actions   # or change-state
//!   residual_status: pending       # or draft
//! actors:
//!   institution_cache_ttl_secs: 30
//! auth:
//!   token_env: FB_API_TOKEN
//! daemon:
//!   bind: "127.0.0.1:8899"
//!   event_buffer: 1024
//! ```
//!
//! Every key is optional; the defaults above apply.

use anyhow::{bail, Context, Result};
use fb_workflow::{GatewaySettings, ResidualStatusPolicy, TransitionApi};
use serde_json::Value;

use crate::secrets::token_env_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub base_url: String,
    pub graphql_path: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorSettings {
    pub institution_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    pub bind: String,
    pub event_buffer: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub backend: BackendSettings,
    pub gateway: GatewaySettings,
    pub actors: ActorSettings,
    pub daemon: DaemonSettings,
    pub token_env: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            backend: BackendSettings {
                base_url: "http://127.0.0.1:8080".to_string(),
                graphql_path: "/graphql".to_string(),
                timeout_ms: 10_000,
            },
            gateway: GatewaySettings::default(),
            actors: ActorSettings {
                institution_cache_ttl_secs: 30,
            },
            daemon: DaemonSettings {
                bind: "127.0.0.1:8899".to_string(),
                event_buffer: 1024,
            },
            token_env: crate::secrets::DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

fn str_at<'a>(v: &'a Value, ptr: &str) -> Result<Option<&'a str>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(other) => bail!("CONFIG_INVALID {ptr}: expected a string, got {other}"),
    }
}

fn u64_at(v: &Value, ptr: &str) -> Result<Option<u64>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(n) => n
            .as_u64()
            .map(Some)
            .with_context(|| format!("CONFIG_INVALID {ptr}: expected a non-negative integer")),
    }
}

impl ConsoleSettings {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let mut s = Self::default();

        if let Some(url) = str_at(v, "/backend/base_url")? {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("CONFIG_INVALID /backend/base_url: must start with http:// or https://");
            }
            s.backend.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(p) = str_at(v, "/backend/graphql_path")? {
            s.backend.graphql_path = if p.starts_with('/') {
                p.to_string()
            } else {
                format!("/{p}")
            };
        }
        if let Some(ms) = u64_at(v, "/backend/timeout_ms")? {
            if ms == 0 {
                bail!("CONFIG_INVALID /backend/timeout_ms: must be positive");
            }
            s.backend.timeout_ms = ms;
        }

        if let Some(api) = str_at(v, "/workflow/transition_api")? {
            s.gateway.api = TransitionApi::parse(api).with_context(|| {
                format!(
                    "CONFIG_INVALID /workflow/transition_api: '{api}' \
                     (expected task-actions | change-state)"
                )
            })?;
        }
        if let Some(policy) = str_at(v, "/workflow/residual_status")? {
            s.gateway.residual_policy = ResidualStatusPolicy::parse(policy).with_context(|| {
                format!(
                    "CONFIG_INVALID /workflow/residual_status: '{policy}' \
                     (expected draft | pending)"
                )
            })?;
        }

        if let Some(ttl) = u64_at(v, "/actors/institution_cache_ttl_secs")? {
            s.actors.institution_cache_ttl_secs = ttl;
        }

        if let Some(bind) = str_at(v, "/daemon/bind")? {
            s.daemon.bind = bind.to_string();
        }
        if let Some(n) = u64_at(v, "/daemon/event_buffer")? {
            if n == 0 {
                bail!("CONFIG_INVALID /daemon/event_buffer: must be positive");
            }
            s.daemon.event_buffer = n as usize;
        }

        s.token_env = token_env_name(v);
        Ok(s)
    }

    pub fn graphql_url(&self) -> String {
        format!("{}{}", self.backend.base_url, self.backend.graphql_path)
    }
}
