//! Request authentication. Two modes:
//!
//! - Bypass (development): requests without credentials get a fixed
//!   development principal; a supplied token is not validated and only
//!   contributes a prefix-derived principal.
//! - Enforced: a bearer token is required and validated as a JWT against
//!   the configured issuer, audience, and key material.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::settings::Settings;

/// Principal assigned to unauthenticated requests in bypass mode.
pub const DEV_USER_ID: &str = "dev_user_001";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid authentication credentials")]
    Unauthenticated,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    uid: Option<String>,
    #[serde(default, rename = "userId")]
    user_id_camel: Option<String>,
}

impl Claims {
    /// The principal is the first present identity claim.
    fn principal(self) -> Option<String> {
        self.sub
            .or(self.user_id)
            .or(self.uid)
            .or(self.user_id_camel)
    }
}

/// Resolve the authenticated principal for a request.
pub fn authenticate(settings: &Settings, bearer: Option<&str>) -> Result<String, AuthError> {
    if settings.enable_auth_bypass {
        return match bearer {
            None => Ok(DEV_USER_ID.to_string()),
            Some("") => Err(AuthError::Unauthenticated),
            Some(token) => Ok(bypass_principal(token)),
        };
    }

    let token = match bearer {
        Some(t) if !t.is_empty() => t,
        _ => return Err(AuthError::Unauthenticated),
    };
    validate_jwt(settings, token)
}

/// In bypass mode a token is not validated; the principal is derived from
/// its prefix so log lines stay distinguishable.
fn bypass_principal(token: &str) -> String {
    if token.chars().count() >= 8 {
        let prefix: String = token.chars().take(8).collect();
        format!("user_{prefix}")
    } else {
        "unknown_user".to_string()
    }
}

fn validate_jwt(settings: &Settings, token: &str) -> Result<String, AuthError> {
    let (key, algorithm) = if settings.jwt_public_key.is_empty() {
        (
            DecodingKey::from_secret(settings.secret_key.as_bytes()),
            Algorithm::HS256,
        )
    } else {
        let key = DecodingKey::from_rsa_pem(settings.jwt_public_key.as_bytes())
            .map_err(|_| AuthError::Unauthenticated)?;
        (key, Algorithm::RS256)
    };

    let mut validation = Validation::new(algorithm);
    if settings.jwt_issuer.is_empty() {
        validation.iss = None;
    } else {
        validation.set_issuer(&[&settings.jwt_issuer]);
    }
    if settings.jwt_audience.is_empty() {
        validation.validate_aud = false;
    } else {
        validation.set_audience(&[&settings.jwt_audience]);
    }

    let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        AuthError::Unauthenticated
    })?;

    data.claims.principal().ok_or(AuthError::Unauthenticated)
}
