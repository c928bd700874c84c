//! JWT token signing and verification
//!
//! Access and refresh tokens are both HS256 JWTs signed with the same
//! secret. The `typ` claim keeps them apart: a refresh token never passes
//! access verification and vice versa.

use estate_core::{JwtSettings, Role};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Which of the two token kinds a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// Subject - user id
    pub sub: String,
    /// Unique token id; two tokens issued in the same second still differ
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
    pub typ: TokenKind,
    /// Present on access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    /// Malformed, tampered, expired or of the wrong kind. Deliberately a
    /// single variant.
    #[error("Invalid token")]
    InvalidToken,

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Signing configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        JwtSettings::default().into()
    }
}

impl From<JwtSettings> for JwtConfig {
    fn from(settings: JwtSettings) -> Self {
        Self {
            secret: settings.secret,
            issuer: settings.issuer,
            access_ttl: settings.access_expiry,
            refresh_ttl: settings.refresh_expiry,
        }
    }
}

impl JwtConfig {
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }
}

/// Sign a token of the given kind for `user_id`
pub fn sign_token(
    config: &JwtConfig,
    user_id: &str,
    kind: TokenKind,
    role: Option<Role>,
) -> Result<(String, Claims), JwtError> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let claims = Claims {
        iss: config.issuer.clone(),
        sub: user_id.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now,
        exp: now + config.ttl(kind).as_secs(),
        typ: kind,
        role: match kind {
            TokenKind::Access => role,
            TokenKind::Refresh => None,
        },
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok((token, claims))
}

/// Verify signature, issuer, expiry and kind
pub fn verify_token(config: &JwtConfig, token: &str, kind: TokenKind) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(reason = ?e.kind(), "JWT rejected");
        JwtError::InvalidToken
    })?;

    if data.claims.typ != kind {
        tracing::debug!(expected = ?kind, actual = ?data.claims.typ, "JWT of wrong kind");
        return Err(JwtError::InvalidToken);
    }
    if kind == TokenKind::Access && data.claims.role.is_none() {
        return Err(JwtError::InvalidToken);
    }

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_access() {
        let config = JwtConfig::default();
        let (token, _) = sign_token(&config, "u1", TokenKind::Access, Some(Role::Admin)).unwrap();

        let claims = verify_token(&config, &token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Some(Role::Admin));
        assert_eq!(claims.iss, "estate-listings");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_refresh_has_no_role_and_longer_ttl() {
        let config = JwtConfig::default();
        let (token, claims) =
            sign_token(&config, "u1", TokenKind::Refresh, Some(Role::Admin)).unwrap();

        assert!(claims.role.is_none());
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
        assert!(verify_token(&config, &token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let config = JwtConfig::default();
        let (access, _) = sign_token(&config, "u1", TokenKind::Access, Some(Role::User)).unwrap();
        let (refresh, _) = sign_token(&config, "u1", TokenKind::Refresh, None).unwrap();

        assert!(matches!(
            verify_token(&config, &access, TokenKind::Refresh),
            Err(JwtError::InvalidToken)
        ));
        assert!(matches!(
            verify_token(&config, &refresh, TokenKind::Access),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_tokens_are_unique() {
        let config = JwtConfig::default();
        let (a, _) = sign_token(&config, "u1", TokenKind::Refresh, None).unwrap();
        let (b, _) = sign_token(&config, "u1", TokenKind::Refresh, None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_secret_and_garbage() {
        let config1 = JwtConfig {
            secret: "secret1".to_string(),
            ..Default::default()
        };
        let config2 = JwtConfig {
            secret: "secret2".to_string(),
            ..Default::default()
        };

        let (token, _) = sign_token(&config1, "u1", TokenKind::Access, Some(Role::User)).unwrap();
        assert!(matches!(
            verify_token(&config2, &token, TokenKind::Access),
            Err(JwtError::InvalidToken)
        ));
        assert!(verify_token(&config1, "invalid.token.here", TokenKind::Access).is_err());
    }

    #[test]
    fn test_expired_token() {
        let config = JwtConfig::default();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = Claims {
            iss: config.issuer.clone(),
            sub: "u1".to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
            typ: TokenKind::Access,
            role: Some(Role::User),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            verify_token(&config, &token, TokenKind::Access),
            Err(JwtError::InvalidToken)
        ));
    }
}
