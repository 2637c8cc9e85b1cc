//! Token codec: issuance and verification of HS256 access and refresh
//! tokens.
//!
//! Access and refresh tokens are both signed JWTs carrying the same
//! claims, but with independent secrets and lifetimes, so one can never
//! be presented as the other. Verification is pure; no I/O.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tenantry_core::access::Principal;
use tenantry_core::models::user::Role;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// JWT claims embedded in every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user ID (UUID string).
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Issuer.
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Random token id; two tokens issued in the same second differ.
    pub jti: String,
}

impl Claims {
    pub fn new(principal: &Principal, issuer: &str, ttl_secs: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: principal.id.to_string(),
            email: principal.email.clone(),
            role: principal.role,
            iss: issuer.to_string(),
            iat: now,
            exp: now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX)),
            jti: generate_token_id(),
        }
    }

    pub fn principal(&self) -> Result<Principal, AuthError> {
        let id = Uuid::parse_str(&self.sub)
            .map_err(|e| AuthError::TokenInvalid(format!("bad subject: {e}")))?;
        Ok(Principal {
            id,
            email: self.email.clone(),
            role: self.role,
        })
    }
}

/// Sign `claims` with an HMAC secret.
pub fn issue(claims: &Claims, secret: &[u8]) -> Result<String, AuthError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Verify signature, issuer and expiry (zero leeway) and return the claims.
pub fn verify(token: &str, secret: &[u8], issuer: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// An access token and its rotating refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Issues and verifies both token kinds from one configuration.
#[derive(Clone)]
pub struct TokenCodec {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_ttl: u64,
    refresh_ttl: u64,
    issuer: String,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_token_secret.as_bytes().to_vec(),
            refresh_secret: config.refresh_token_secret.as_bytes().to_vec(),
            access_ttl: config.access_token_lifetime_secs,
            refresh_ttl: config.refresh_token_lifetime_secs,
            issuer: config.jwt_issuer.clone(),
        }
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    pub fn issue(&self, kind: TokenKind, principal: &Principal) -> Result<String, AuthError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        issue(&Claims::new(principal, &self.issuer, ttl), self.secret(kind))
    }

    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, AuthError> {
        verify(token, self.secret(kind), &self.issuer)
    }

    pub fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(TokenKind::Access, principal)?,
            refresh_token: self.issue(TokenKind::Refresh, principal)?,
            token_type: "Bearer".into(),
            expires_in: self.access_ttl,
        })
    }
}

/// 16 random bytes, base64url-encoded without padding.
fn generate_token_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw refresh token, hex-encoded.
///
/// This is the value stored as `user.refresh_token_hash`.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
