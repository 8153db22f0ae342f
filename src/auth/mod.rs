/*!
 * # Authentication and Authorization Module
 *
 * Provides JWT-based authentication and the centrally evaluated
 * authorization policy for the storefront API:
 *
 * - HS256 bearer tokens issued by the login/admin-login/admin-register flows
 * - Argon2id password hashing ([`password`])
 * - A declarative capability table mapping verb x resource to the required
 *   role, evaluated by router middleware ([`policy`])
 */

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::entities::user;
use crate::errors::ServiceError;

pub mod password;
pub mod policy;

pub use policy::{Access, PolicyRouterExt, Resource};

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // Subject (user ID)
    pub username: String,
    pub email: String,
    pub staff: bool,
    pub superuser: bool,
    pub jti: String, // JWT ID (unique identifier for this token)
    pub iat: i64,    // Issued at time
    pub exp: i64,    // Expiration time
    pub nbf: i64,    // Not valid before time
    pub iss: String, // Issuer
    pub aud: String, // Audience
}

/// Authenticated caller data extracted from a validated JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub token_id: String,
}

impl AuthUser {
    /// Check if the caller carries an elevated role
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_issuer: String,
        jwt_audience: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            access_token_expiration,
        }
    }
}

/// Bearer token issued on successful authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Generate a JWT token for a user
    pub fn issue_token(&self, user: &user::Model) -> Result<IssuedToken, ServiceError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| ServiceError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            staff: user.is_staff,
            superuser: user.is_superuser,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("Token creation failed: {e}")))?;

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.clone()]);
        validation.set_issuer(&[self.config.jwt_issuer.clone()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("Token has expired".to_string())
            }
            _ => ServiceError::Unauthorized("Invalid authentication token".to_string()),
        })?
        .claims;

        Ok(claims)
    }
}

/// Authentication middleware that extracts and validates a bearer token when
/// one is present. Requests without an `Authorization` header proceed
/// anonymously; the policy layer decides whether that is acceptable.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return ServiceError::InternalError("Authentication service not available".to_string())
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// Extract authentication info from request headers.
/// Returns `Ok(None)` when no bearer token was supplied.
fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<Option<AuthUser>, ServiceError> {
    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_value = auth_header
        .to_str()
        .map_err(|_| ServiceError::Unauthorized("Invalid authorization header".to_string()))?;

    let Some(token) = auth_value.strip_prefix("Bearer ") else {
        return Err(ServiceError::Unauthorized(
            "Invalid authorization header".to_string(),
        ));
    };

    let claims = auth_service.validate_token(token.trim())?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ServiceError::Unauthorized("Invalid authentication token".to_string()))?;

    Ok(Some(AuthUser {
        user_id,
        username: claims.username,
        email: claims.email,
        is_staff: claims.staff,
        is_superuser: claims.superuser,
        token_id: claims.jti,
    }))
}

/// Extractor for handlers that require an authenticated caller.
/// The policy layer rejects anonymous requests before handlers run, so this
/// only fails when a handler is wired onto a public route by mistake.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AuthUser);

#[async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(|| ServiceError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "test_secret_key_for_testing_purposes_only_32chars".into(),
            "storefront-auth".into(),
            "storefront-api".into(),
            Duration::from_secs(3600),
        ))
    }

    fn test_user(is_staff: bool) -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: String::new(),
            is_staff,
            is_superuser: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_round_trips() {
        let service = test_service();
        let user = test_user(true);

        let token = service.issue_token(&user).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 3600);

        let claims = service.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.username, "alice");
        assert!(claims.staff);
        assert!(!claims.superuser);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let service = test_service();
        let token = service.issue_token(&test_user(false)).unwrap();

        let mut tampered = token.access_token.clone();
        tampered.push('x');
        assert!(service.validate_token(&tampered).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let service = test_service();
        let other = AuthService::new(AuthConfig::new(
            "another_secret_key_that_is_also_long_enough_xyz".into(),
            "storefront-auth".into(),
            "storefront-api".into(),
            Duration::from_secs(3600),
        ));

        let token = other.issue_token(&test_user(false)).unwrap();
        assert!(service.validate_token(&token.access_token).is_err());
    }
}
