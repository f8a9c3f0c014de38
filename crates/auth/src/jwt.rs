//! Bearer token decoding and signature verification.
//!
//! The wire format is a standard HS256 JWT with numeric `iat`/`exp` claims.
//! Decoding produces the transport-agnostic [`JwtClaims`] model, which is
//! then re-checked with [`validate_claims`] so the time-window rules stay in
//! one place regardless of what the JWT library enforces.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradebinder_core::UserId;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};
use crate::roles::Role;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("malformed or badly signed token")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("invalid subject claim: {0}")]
    InvalidSubject(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a bearer token and produces validated claims.
///
/// Trait seam so the API layer can be tested with a permissive validator
/// while production wires in [`Hs256JwtValidator`].
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<JwtClaims, JwtError>;
}

/// On-the-wire claim shape (RFC 7519 registered names + roles).
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    #[serde(default)]
    roles: Vec<Role>,
    iat: i64,
    exp: i64,
}

/// HMAC-SHA256 validator with a shared secret.
pub struct Hs256JwtValidator {
    decoding_key: DecodingKey,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time-window checks happen in validate_claims, against one clock read.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<WireClaims>(token, &self.decoding_key, &validation)?;
        let wire = data.claims;

        let sub: UserId = wire
            .sub
            .parse()
            .map_err(|_| JwtError::InvalidSubject(wire.sub.clone()))?;

        let claims = JwtClaims {
            sub,
            roles: wire.roles,
            issued_at: timestamp(wire.iat)?,
            expires_at: timestamp(wire.exp)?,
        };

        validate_claims(&claims, Utc::now())?;
        Ok(claims)
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, JwtError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or(JwtError::Claims(TokenValidationError::InvalidTimeWindow))
}

/// Mint a signed token for the given claims. Test/dev helper; production
/// tokens come from an external identity provider.
pub fn mint_hs256(secret: &[u8], claims: &JwtClaims) -> Result<String, JwtError> {
    let wire = WireClaims {
        sub: claims.sub.to_string(),
        roles: claims.roles.clone(),
        iat: claims.issued_at.timestamp(),
        exp: claims.expires_at.timestamp(),
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &wire,
        &EncodingKey::from_secret(secret),
    )?)
}
