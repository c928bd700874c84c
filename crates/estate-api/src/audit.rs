//! Security audit logging for account events
//!
//! Audit events are emitted at INFO level on the `audit` target so they can
//! be routed apart from application logs, e.g. `RUST_LOG=audit=info`.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

/// Client metadata attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: String,
        email: String,
        #[serde(flatten)]
        meta: RequestMeta,
    },
    RegistrationFailure {
        email: String,
        reason: String,
        #[serde(flatten)]
        meta: RequestMeta,
    },
    LoginSuccess {
        user_id: String,
        email: String,
        #[serde(flatten)]
        meta: RequestMeta,
    },
    LoginFailure {
        email: String,
        reason: String,
        #[serde(flatten)]
        meta: RequestMeta,
    },
    EmailVerified {
        user_id: String,
        email: String,
    },
    TokenRefresh {
        user_id: String,
        #[serde(flatten)]
        meta: RequestMeta,
    },
    Logout {
        user_id: Option<String>,
        #[serde(flatten)]
        meta: RequestMeta,
    },
    PasswordChange {
        user_id: String,
        #[serde(flatten)]
        meta: RequestMeta,
    },
    PasswordResetRequested {
        user_id: String,
        email: String,
        #[serde(flatten)]
        meta: RequestMeta,
    },
    PasswordResetCompleted {
        user_id: String,
        #[serde(flatten)]
        meta: RequestMeta,
    },
    AccessDenied {
        user_id: String,
        resource: String,
        required_role: String,
        #[serde(flatten)]
        meta: RequestMeta,
    },
    InvalidToken {
        reason: String,
        #[serde(flatten)]
        meta: RequestMeta,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::EmailVerified { .. } => "Email verified",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::PasswordChange { .. } => "Password changed",
            AuditEvent::PasswordResetRequested { .. } => "Password reset requested",
            AuditEvent::PasswordResetCompleted { .. } => "Password reset completed",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
        }
    }
}

/// Log a security audit event
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    tracing::info!(
        target: "audit",
        timestamp = %Utc::now(),
        event = %event_json,
        "{}",
        event.summary()
    );
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(|ip| ip.to_string())
    })
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            user_id: "u1".to_string(),
            email: "test@example.com".to_string(),
            meta: RequestMeta {
                ip_address: Some("192.168.1.1".to_string()),
                user_agent: None,
            },
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "login_success");
        assert_eq!(json["ip_address"], "192.168.1.1");

        audit_log(&event);
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );
        headers.insert("x-real-ip", "10.0.0.1".parse().unwrap());

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_request_meta_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.9".parse().unwrap());
        headers.insert(header::USER_AGENT, "curl/8.0".parse().unwrap());

        let meta = RequestMeta::from_headers(&headers);
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(RequestMeta::from_headers(&HeaderMap::new()), RequestMeta::default());
    }
}
