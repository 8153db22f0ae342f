//! Central authorization policy.
//!
//! One declarative capability table maps (resource, verb) to the access level
//! a caller needs. Router middleware evaluates the table before any handler
//! logic runs; handlers never repeat role checks. Ownership narrowing for
//! orders (a non-admin only sees their own) lives in the order service.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use super::AuthUser;
use crate::errors::ServiceError;

/// Resource kinds the API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Products,
    ProductInfo,
    Orders,
    Register,
    Login,
    AdminLogin,
    AdminRegister,
}

/// Access level required for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone, including unauthenticated callers
    Public,
    /// Any caller with a valid token
    Authenticated,
    /// Callers with the staff or superuser flag
    Admin,
}

/// The capability table: (resource, verbs, required access).
/// Verbs absent for a resource are denied outright.
static ACCESS_TABLE: &[(Resource, &[Method], Access)] = &[
    (Resource::Products, &[Method::GET], Access::Public),
    (
        Resource::Products,
        &[Method::POST, Method::PUT, Method::PATCH, Method::DELETE],
        Access::Admin,
    ),
    (Resource::ProductInfo, &[Method::GET], Access::Public),
    (
        Resource::Orders,
        &[
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ],
        Access::Authenticated,
    ),
    (Resource::Register, &[Method::POST], Access::Public),
    (Resource::Login, &[Method::POST], Access::Public),
    // Credential submission is open; the companion status read requires a token.
    (Resource::AdminLogin, &[Method::POST], Access::Public),
    (Resource::AdminLogin, &[Method::GET], Access::Authenticated),
    (Resource::AdminRegister, &[Method::POST], Access::Public),
];

/// Look up the access level required for `resource` under `method`.
/// `None` means the combination is not in the table and must be denied.
pub fn required_access(resource: Resource, method: &Method) -> Option<Access> {
    ACCESS_TABLE
        .iter()
        .find(|(r, methods, _)| *r == resource && methods.contains(method))
        .map(|(_, _, access)| *access)
}

/// Evaluate the table for one request. Denials never reveal whether the
/// target resource exists.
pub fn authorize(caller: Option<&AuthUser>, resource: Resource, method: &Method) -> Result<(), ServiceError> {
    match required_access(resource, method) {
        None => Err(ServiceError::Forbidden(
            "Operation not permitted".to_string(),
        )),
        Some(Access::Public) => Ok(()),
        Some(Access::Authenticated) => match caller {
            Some(_) => Ok(()),
            None => Err(ServiceError::Unauthorized(
                "Authentication required".to_string(),
            )),
        },
        Some(Access::Admin) => match caller {
            Some(user) if user.is_admin() => Ok(()),
            Some(_) => Err(ServiceError::Forbidden(
                "Admin privileges required".to_string(),
            )),
            None => Err(ServiceError::Unauthorized(
                "Authentication required".to_string(),
            )),
        },
    }
}

/// Policy middleware bound to one resource kind.
pub async fn policy_middleware(
    State(resource): State<Resource>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let caller = request.extensions().get::<AuthUser>();
    authorize(caller, resource, request.method())?;
    Ok(next.run(request).await)
}

/// Extension methods for Router to gate routes on the capability table
pub trait PolicyRouterExt {
    fn with_access(self, resource: Resource) -> Self;
}

impl<S> PolicyRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_access(self, resource: Resource) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            resource,
            policy_middleware,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn caller(is_staff: bool) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            username: "u".into(),
            email: "u@example.com".into(),
            is_staff,
            is_superuser: false,
            token_id: "jti".into(),
        }
    }

    #[test]
    fn product_reads_are_public() {
        assert!(authorize(None, Resource::Products, &Method::GET).is_ok());
        assert!(authorize(None, Resource::ProductInfo, &Method::GET).is_ok());
    }

    #[test]
    fn product_writes_require_admin() {
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            let err = authorize(None, Resource::Products, &method).unwrap_err();
            assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);

            let err = authorize(Some(&caller(false)), Resource::Products, &method).unwrap_err();
            assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);

            assert!(authorize(Some(&caller(true)), Resource::Products, &method).is_ok());
        }
    }

    #[test]
    fn orders_require_authentication_only() {
        assert!(authorize(None, Resource::Orders, &Method::GET).is_err());
        assert!(authorize(Some(&caller(false)), Resource::Orders, &Method::POST).is_ok());
        assert!(authorize(Some(&caller(true)), Resource::Orders, &Method::DELETE).is_ok());
    }

    #[test]
    fn registration_and_logins_are_public() {
        assert!(authorize(None, Resource::Register, &Method::POST).is_ok());
        assert!(authorize(None, Resource::Login, &Method::POST).is_ok());
        assert!(authorize(None, Resource::AdminLogin, &Method::POST).is_ok());
        assert!(authorize(None, Resource::AdminRegister, &Method::POST).is_ok());
    }

    #[test]
    fn admin_status_read_requires_authentication() {
        let err = authorize(None, Resource::AdminLogin, &Method::GET).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
        assert!(authorize(Some(&caller(false)), Resource::AdminLogin, &Method::GET).is_ok());
    }

    #[test]
    fn unlisted_verbs_are_denied() {
        let err = authorize(Some(&caller(true)), Resource::Register, &Method::DELETE).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
        assert!(required_access(Resource::Login, &Method::GET).is_none());
    }

    #[test]
    fn superuser_counts_as_admin() {
        let mut user = caller(false);
        user.is_superuser = true;
        assert!(authorize(Some(&user), Resource::Products, &Method::POST).is_ok());
    }
}
