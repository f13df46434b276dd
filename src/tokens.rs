//! Token Service: HS256 session, access and refresh tokens.
//!
//! Session and access tokens share `JWT_SECRET`; refresh tokens are signed with
//! `JWT_REFRESH_SECRET` so a leaked refresh token can never pass the access gate.
//! Every operation takes the current Unix time explicitly. Expiry is enforced here
//! with zero leeway (`now >= exp` is expired) instead of by the JWT library's clock.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;

/// Claims
///
/// Payload of every token this service mints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the admin's id.
    pub sub: Uuid,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds). The token is dead from this instant on.
    pub exp: i64,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Issued by login, 8 hours by default.
    Session,
    /// Minted by the refresh endpoint, 15 minutes by default.
    Access,
    Refresh,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is not valid")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Refresh token is not valid")]
    RefreshInvalid,

    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// TokenService
///
/// Cheap to clone; pulled out of `AppState` by the gate and the auth handlers.
#[derive(Clone)]
pub struct TokenService {
    access_keys: KeyPair,
    refresh_keys: KeyPair,
    session_ttl_secs: i64,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            access_keys: KeyPair::from_secret(&config.jwt_secret),
            refresh_keys: KeyPair::from_secret(&config.jwt_refresh_secret),
            session_ttl_secs: config.session_token_ttl_mins * 60,
            access_ttl_secs: config.access_token_ttl_mins * 60,
            refresh_ttl_secs: config.refresh_token_ttl_days * 24 * 60 * 60,
        }
    }

    pub fn issue_session(&self, admin_id: Uuid, now: i64) -> Result<String, TokenError> {
        self.issue(admin_id, now, TokenKind::Session)
    }

    pub fn issue_access(&self, admin_id: Uuid, now: i64) -> Result<String, TokenError> {
        self.issue(admin_id, now, TokenKind::Access)
    }

    pub fn issue_refresh(&self, admin_id: Uuid, now: i64) -> Result<String, TokenError> {
        self.issue(admin_id, now, TokenKind::Refresh)
    }

    /// verify
    ///
    /// Accepts session and access tokens. Returns the embedded admin id.
    pub fn verify(&self, token: &str, now: i64) -> Result<Uuid, TokenError> {
        let claims = decode_claims(token, &self.access_keys.decoding)?;
        if claims.kind == TokenKind::Refresh {
            return Err(TokenError::Invalid);
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims.sub)
    }

    /// verify_refresh
    ///
    /// Accepts refresh tokens only. Every failure collapses into `RefreshInvalid`.
    pub fn verify_refresh(&self, token: &str, now: i64) -> Result<Uuid, TokenError> {
        let claims = decode_claims(token, &self.refresh_keys.decoding)
            .map_err(|_| TokenError::RefreshInvalid)?;
        if claims.kind != TokenKind::Refresh || now >= claims.exp {
            return Err(TokenError::RefreshInvalid);
        }
        Ok(claims.sub)
    }

    fn issue(&self, admin_id: Uuid, now: i64, kind: TokenKind) -> Result<String, TokenError> {
        let (keys, ttl) = match kind {
            TokenKind::Session => (&self.access_keys, self.session_ttl_secs),
            TokenKind::Access => (&self.access_keys, self.access_ttl_secs),
            TokenKind::Refresh => (&self.refresh_keys, self.refresh_ttl_secs),
        };

        let claims = Claims {
            sub: admin_id,
            iat: now,
            exp: now + ttl,
            kind,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

fn decode_claims(token: &str, key: &DecodingKey) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is compared against the caller-supplied clock instead.
    validation.validate_exp = false;

    decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            TokenError::Invalid
        })
}
