/// Authentication middleware for protecting routes
///
/// Verifies the bearer access token and attaches a typed
/// [`AuthenticatedUser`] to the request extensions. It never touches the
/// credential store: access tokens are self-verifying.
use crate::audit::{audit_log, AuditEvent, RequestMeta};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use estate_core::Role;
use std::sync::Arc;
use thiserror::Error;

/// Identity attached to authenticated requests
///
/// Handlers read it with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: Role,
    pub jti: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Admin access required")]
    InsufficientPermissions,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => AppError::Forbidden(err.to_string()),
            _ => AppError::Unauthorized(err.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

fn bearer_token(request: &Request<Body>) -> Result<&str, AuthError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Require a valid access token
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&request)?;

    let verified = match state.tokens.verify_access(token) {
        Ok(v) => v,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: e.to_string(),
                meta: RequestMeta::from_headers(request.headers()),
            });
            return Err(AuthError::InvalidToken);
        }
    };

    let user = AuthenticatedUser {
        user_id: verified.user_id,
        role: verified.role.unwrap_or_default(),
        jti: verified.jti,
    };
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Require the admin role. Must run after [`require_auth`].
pub async fn require_admin(request: Request<Body>, next: Next) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or(AuthError::MissingAuthHeader)?;

    if !user.is_admin() {
        audit_log(&AuditEvent::AccessDenied {
            user_id: user.user_id.clone(),
            resource: request.uri().path().to_string(),
            required_role: Role::Admin.to_string(),
            meta: RequestMeta::from_headers(request.headers()),
        });
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request).unwrap(), "abc.def.ghi");

        let request = Request::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert!(matches!(
            bearer_token(&request),
            Err(AuthError::InvalidAuthHeader)
        ));

        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(matches!(
            bearer_token(&request),
            Err(AuthError::MissingAuthHeader)
        ));
    }

    #[test]
    fn test_auth_error_status() {
        assert_eq!(
            AppError::from(AuthError::InvalidToken).status(),
            axum::http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(AuthError::InsufficientPermissions).status(),
            axum::http::StatusCode::FORBIDDEN
        );
    }
}
