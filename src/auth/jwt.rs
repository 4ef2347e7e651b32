use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{config::JwtConfig, error::ApiError};

/// JWT payload. Access and refresh tokens carry exactly the same claims;
/// the only difference between them is the TTL they were issued with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub iat: i64,    // issued at (unix timestamp)
    pub exp: i64,    // expires at (unix timestamp)
}

/// Result of checking a token's signature and structure. Expiry is data, not
/// an error: the refresh flow still needs the subject of an expired token.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub subject: String,
    pub is_expired: bool,
}

/// Signing and verification keys plus the two configured TTLs. Built once at
/// startup from config and shared immutably; tests build their own with
/// distinct secrets.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            access_ttl: Duration::from_secs(cfg.access_ttl_minutes.max(0) as u64 * 60),
            refresh_ttl: Duration::from_secs(cfg.refresh_ttl_minutes.max(0) as u64 * 60),
        }
    }

    pub fn issue(&self, username: &str, ttl: Duration) -> Result<String, ApiError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: username.to_owned(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(e.into()))?;
        debug!(username, "token signed");
        Ok(token)
    }

    pub fn issue_access(&self, username: &str) -> Result<String, ApiError> {
        self.issue(username, self.access_ttl)
    }

    pub fn issue_refresh(&self, username: &str) -> Result<String, ApiError> {
        self.issue(username, self.refresh_ttl)
    }

    /// Fails only on a bad signature or malformed structure. An expired token
    /// decodes fine and comes back with `is_expired` set; callers decide what
    /// that means. Expiry is `exp <= now` on this process's clock, no leeway.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| ApiError::InvalidToken)?;
        let is_expired = data.claims.exp <= OffsetDateTime::now_utc().unix_timestamp();
        debug!(username = %data.claims.sub, is_expired, "token verified");
        Ok(VerifiedToken {
            subject: data.claims.sub,
            is_expired,
        })
    }

    /// Subject of a correctly-signed token, expired or not.
    pub fn extract_subject(&self, token: &str) -> Result<String, ApiError> {
        Ok(self.verify(token)?.subject)
    }
}
