//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only the env var NAME of the bearer token
//!   (`auth.token_env`, default `FB_API_TOKEN`).
//! - Binaries call [`resolve_api_token`] once at startup and pass the
//!   result into constructors. Nothing else reads the environment.
//! - `Debug` redacts the value; errors name the variable, never its value.

use anyhow::{bail, Result};
use serde_json::Value;

pub const DEFAULT_TOKEN_ENV: &str = "FB_API_TOKEN";

/// Secrets resolved from the environment. **Values are redacted in `Debug`.**
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Name of the variable the token was read from.
    pub token_env: String,
    /// `None` if the variable was unset or blank.
    pub api_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("token_env", &self.token_env)
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ResolvedSecrets {
    /// The token, or `SECRETS_MISSING` naming the variable.
    pub fn require_token(&self) -> Result<&str> {
        match self.api_token.as_deref() {
            Some(t) => Ok(t),
            None => bail!(
                "SECRETS_MISSING: required env var '{}' (bearer token) is not set or empty",
                self.token_env
            ),
        }
    }
}

pub(crate) fn token_env_name(config_json: &Value) -> String {
    config_json
        .pointer("/auth/token_env")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_TOKEN_ENV)
        .to_string()
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Resolve the bearer token named by `auth.token_env`.
///
/// With `required`, a missing token fails closed with `SECRETS_MISSING`.
/// Read-only commands such as `workflow table` pass `false`.
pub fn resolve_api_token(config_json: &Value, required: bool) -> Result<ResolvedSecrets> {
    let token_env = token_env_name(config_json);
    let secrets = ResolvedSecrets {
        api_token: resolve_env(&token_env),
        token_env,
    };
    if required {
        secrets.require_token()?;
    }
    Ok(secrets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_env_name_when_unset_or_blank() {
        assert_eq!(token_env_name(&json!({})), DEFAULT_TOKEN_ENV);
        assert_eq!(
            token_env_name(&json!({"auth": {"token_env": "  "}})),
            DEFAULT_TOKEN_ENV
        );
        assert_eq!(
            token_env_name(&json!({"auth": {"token_env": "FB_TOKEN_UAT"}})),
            "FB_TOKEN_UAT"
        );
    }

    #[test]
    fn debug_redacts_value() {
        let s = ResolvedSecrets {
            token_env: "FB_API_TOKEN".to_string(),
            api_token: Some("eyJ.super.secret".to_string()),
        };
        let dbg = format!("{s:?}");
        assert!(dbg.contains("<REDACTED>"));
        assert!(!dbg.contains("super"));
    }
}
