//! Session decoding.
//!
//! The identity provider issues a JWT. Its signature is checked by the
//! backend on every request; here the claims are only read to learn who the
//! caller is and which stages they hold. Expiry is still enforced locally
//! so an expired token fails before any request is sent.
//!
//! `role` is the primary stage. Staff holding several stages carry the
//! others in `roles`; names that are not workflow stages are ignored there.

use fb_workflow::{Role, Session};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    role: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default, rename = "negotiatorId")]
    negotiator_id: Option<String>,
    exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Malformed(String),
    Expired { exp: i64 },
    UnknownRole(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Malformed(msg) => write!(f, "malformed bearer token: {msg}"),
            SessionError::Expired { exp } => write!(f, "bearer token expired at {exp}"),
            SessionError::UnknownRole(r) => write!(f, "token role '{r}' is not a workflow role"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Decode `token` into a [`Session`], treating it as expired at or after
/// `now` (unix seconds).
pub fn decode_session_at(token: &str, now: i64) -> Result<Session, SessionError> {
    let token = token.trim();
    let token = token.strip_prefix("Bearer ").unwrap_or(token);

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| SessionError::Malformed(e.to_string()))?;
    let claims = data.claims;

    if claims.exp <= now {
        return Err(SessionError::Expired { exp: claims.exp });
    }
    let role = Role::parse(&claims.role).ok_or(SessionError::UnknownRole(claims.role))?;

    let extra: Vec<Role> = claims.roles.iter().filter_map(|r| Role::parse(r)).collect();

    Ok(Session::new(claims.sub, role, claims.negotiator_id, token).granting(extra))
}

pub fn decode_session(token: &str) -> Result<Session, SessionError> {
    decode_session_at(token, chrono::Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn token(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"idp-only-knows-this"),
        )
        .unwrap()
    }

    #[test]
    fn decodes_claims_without_the_signing_key() {
        let t = token(json!({
            "sub": "u-42",
            "role": "validation-tcc-finale",
            "negotiatorId": "neg-5",
            "exp": 2_000
        }));
        let s = decode_session_at(&format!("Bearer {t}"), 1_000).unwrap();
        assert_eq!(s.subject, "u-42");
        assert_eq!(s.role(), Role::TccFinalValidator);
        assert_eq!(s.negotiator_id.as_deref(), Some("neg-5"));
        assert_eq!(s.bearer_token(), t);
    }

    #[test]
    fn extra_roles_are_granted_but_not_assumed() {
        let t = token(json!({
            "sub": "u-9",
            "role": "tcc-first-validator",
            "roles": ["validation-tcc-finale", "auditor"],
            "exp": 2_000
        }));
        let s = decode_session_at(&t, 1_000).unwrap();
        assert_eq!(s.role(), Role::TccFirstValidator);
        assert_eq!(
            s.granted_roles(),
            &[Role::TccFirstValidator, Role::TccFinalValidator]
        );
        assert!(!s.holds(Role::Investor));
    }

    #[test]
    fn expired_token_is_refused() {
        let t = token(json!({"sub": "u", "role": "investor", "exp": 1_000}));
        assert_eq!(
            decode_session_at(&t, 1_000),
            Err(SessionError::Expired { exp: 1_000 })
        );
    }

    #[test]
    fn missing_exp_or_garbage_is_malformed() {
        let t = token(json!({"sub": "u", "role": "investor"}));
        assert!(matches!(
            decode_session_at(&t, 0),
            Err(SessionError::Malformed(_))
        ));
        assert!(matches!(
            decode_session_at("not-a-jwt", 0),
            Err(SessionError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_role_is_refused() {
        let t = token(json!({"sub": "u", "role": "auditor", "exp": 5}));
        assert_eq!(
            decode_session_at(&t, 0),
            Err(SessionError::UnknownRole("auditor".to_string()))
        );
    }
}
