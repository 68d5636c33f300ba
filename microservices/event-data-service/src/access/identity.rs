//! Caller identity resolution
//!
//! Bearer JWTs identify users; share tokens grant read access to one website.

use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pulse_core::{UserId, WebsiteId};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub const SHARE_TOKEN_HEADER: &str = "x-pulse-share-token";

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub is_admin: bool,
}

/// Who is asking. Both parts are optional; an identity with neither is anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user: Option<AuthenticatedUser>,
    pub share: Option<WebsiteId>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: UserId, is_admin: bool) -> Self {
        Self {
            user: Some(AuthenticatedUser { user_id, is_admin }),
            share: None,
        }
    }

    pub fn share(website_id: WebsiteId) -> Self {
        Self {
            user: None,
            share: Some(website_id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none() && self.share.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserClaims {
    sub: String,
    iss: String,
    exp: i64,
    iat: i64,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ShareClaims {
    website_id: String,
    iss: String,
    exp: i64,
    iat: i64,
}

/// Verifies HS256 tokens issued by the platform
#[derive(Clone)]
pub struct IdentityResolver {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl IdentityResolver {
    pub fn new(secret: &str, issuer: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
        }
    }

    /// Invalid or missing credentials resolve to an anonymous identity.
    pub fn resolve(&self, headers: &HeaderMap) -> Identity {
        let user = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| self.verify_user_token(token));

        let share = headers
            .get(SHARE_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|token| self.verify_share_token(token));

        Identity { user, share }
    }

    pub fn issue_user_token(
        &self,
        user_id: UserId,
        is_admin: bool,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = UserClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            role: is_admin.then(|| ADMIN_ROLE.to_string()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    pub fn issue_share_token(
        &self,
        website_id: WebsiteId,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = ShareClaims {
            website_id: website_id.to_string(),
            iss: self.issuer.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation
    }

    fn verify_user_token(&self, token: &str) -> Option<AuthenticatedUser> {
        let claims = decode::<UserClaims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| debug!(error = %e, "Rejected bearer token"))
            .ok()?
            .claims;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| debug!(error = %e, "Bearer token subject is not a user id"))
            .ok()?;

        Some(AuthenticatedUser {
            user_id: UserId(user_id),
            is_admin: claims.role.as_deref() == Some(ADMIN_ROLE),
        })
    }

    fn verify_share_token(&self, token: &str) -> Option<WebsiteId> {
        let claims = decode::<ShareClaims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| debug!(error = %e, "Rejected share token"))
            .ok()?
            .claims;

        Uuid::parse_str(&claims.website_id).ok().map(WebsiteId)
    }
}
