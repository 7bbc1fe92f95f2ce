//! Authentication and authorization utilities
//!
//! Provides:
//! - JWT token generation and validation
//! - `Identity` extraction (user, optional organization, role)
//! - `Caller` extraction for endpoints that require organization membership

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Role of a user within their organization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

/// Who is calling, as resolved from request credentials
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,

    /// Absent for users that have not joined an organization yet
    pub organization_id: Option<Uuid>,

    pub role: Role,
}

impl Identity {
    /// Narrow to a caller with organization membership
    pub fn require_organization(self) -> Result<Caller> {
        let organization_id = self.organization_id.ok_or_else(|| AppError::Unauthorized {
            message: "Organization membership required".to_string(),
        })?;

        Ok(Caller {
            user_id: self.user_id,
            organization_id,
            role: self.role,
        })
    }
}

/// An authenticated user acting on behalf of their organization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: Uuid, organization_id: Uuid) -> Self {
        Self {
            user_id,
            organization_id,
            role: Role::Member,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require the admin role, returning error if not present
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Administrator role required"))
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Organization ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    #[serde(default)]
    pub role: Role,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
        role: Role,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            org: organization_id.map(|id| id.to_string()),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }

    /// Resolve a bearer token into an identity
    pub fn identify(&self, token: &str) -> Result<Identity> {
        let claims = self.validate_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
        let organization_id = claims
            .org
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| AppError::InvalidToken)?;

        Ok(Identity {
            user_id,
            organization_id,
            role: claims.role,
        })
    }
}

/// Extract the token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for Identity
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must use the Bearer scheme".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        jwt.identify(token)
    }
}

/// Axum extractor for Caller: rejects identities without an organization
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        Identity::from_request_parts(parts, state)
            .await?
            .require_organization()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();

        let token = manager
            .generate_token(user_id, Some(org_id), Role::Admin)
            .unwrap();
        let identity = manager.identify(&token).unwrap();

        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.organization_id, Some(org_id));
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn test_identity_without_organization_is_unauthorized() {
        let manager = JwtManager::new("test_secret", 3600);
        let token = manager
            .generate_token(Uuid::new_v4(), None, Role::Member)
            .unwrap();

        let err = manager
            .identify(&token)
            .unwrap()
            .require_organization()
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let issuer = JwtManager::new("secret_a", 3600);
        let verifier = JwtManager::new("secret_b", 3600);
        let token = issuer
            .generate_token(Uuid::new_v4(), Some(Uuid::new_v4()), Role::Member)
            .unwrap();

        assert!(matches!(verifier.identify(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_require_admin() {
        let mut caller = Caller::new(Uuid::new_v4(), Uuid::new_v4());
        assert!(caller.require_admin().is_err());
        caller.role = Role::Admin;
        assert!(caller.require_admin().is_ok());
    }
}
