//! Token service
//!
//! Mints and verifies access/refresh pairs and manages the persisted
//! refresh-token list. Only SHA-256 digests of refresh tokens are stored.

use super::jwt::{sign_token, verify_token, Claims, JwtConfig, JwtError, TokenKind};
use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use estate_core::{RefreshTokenEntry, Role, User, UserStore};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use utoipa::ToSchema;

/// Freshly issued access/refresh pair
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Identity carried by a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: String,
    pub role: Option<Role>,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Claims> for VerifiedToken {
    fn from(claims: Claims) -> Self {
        let expires_at = i64::try_from(claims.exp)
            .ok()
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .unwrap_or_else(Utc::now);
        Self {
            user_id: claims.sub,
            role: claims.role,
            jti: claims.jti,
            expires_at,
        }
    }
}

pub struct TokenService {
    config: JwtConfig,
    users: Arc<dyn UserStore>,
}

impl TokenService {
    pub fn new(config: JwtConfig, users: Arc<dyn UserStore>) -> Self {
        Self { config, users }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Sign a new pair. Persisting the refresh token is up to the caller.
    pub fn issue(&self, user_id: &str, role: Role) -> Result<TokenPair, AppError> {
        let (access_token, _) = sign_token(&self.config, user_id, TokenKind::Access, Some(role))
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let (refresh_token, _) = sign_token(&self.config, user_id, TokenKind::Refresh, None)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<VerifiedToken, JwtError> {
        verify_token(&self.config, token, TokenKind::Access).map(VerifiedToken::from)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<VerifiedToken, JwtError> {
        verify_token(&self.config, token, TokenKind::Refresh).map(VerifiedToken::from)
    }

    fn entry_for(&self, refresh_token: &str) -> Result<RefreshTokenEntry, AppError> {
        let ttl = chrono::Duration::from_std(self.config.refresh_ttl)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(RefreshTokenEntry {
            token_hash: hash_token(refresh_token),
            expires_at: Utc::now() + ttl,
        })
    }

    /// Append the refresh token to the user's sessions
    pub async fn persist(&self, user_id: &str, refresh_token: &str) -> Result<(), AppError> {
        let entry = self.entry_for(refresh_token)?;
        self.users.push_refresh_token(user_id, entry, Utc::now()).await?;
        Ok(())
    }

    /// Issue and persist a pair in one step (register, login)
    pub async fn start_session(&self, user: &User) -> Result<TokenPair, AppError> {
        let pair = self.issue(&user.id, user.role)?;
        self.persist(&user.id, &pair.refresh_token).await?;
        Ok(pair)
    }

    /// Remove a refresh token; `false` when it was not held
    pub async fn revoke(&self, user_id: &str, refresh_token: &str) -> Result<bool, AppError> {
        Ok(self
            .users
            .take_refresh_token(user_id, &hash_token(refresh_token))
            .await?)
    }

    /// Revoke every session of the user
    pub async fn revoke_all(&self, user_id: &str) -> Result<(), AppError> {
        self.users.clear_refresh_tokens(user_id).await?;
        Ok(())
    }

    /// Exchange a refresh token for a new pair, consuming the old one.
    ///
    /// The new pair is minted before the old entry is taken. If storing the
    /// new entry fails, the old entry is put back so the session survives.
    pub async fn rotate(&self, refresh_token: &str) -> Result<(User, TokenPair), AppError> {
        let invalid = || AppError::BadRequest("Invalid or expired refresh token".to_string());

        let verified = self.verify_refresh(refresh_token).map_err(|_| invalid())?;

        let user = self
            .users
            .find_user(&verified.user_id)
            .await?
            .ok_or_else(invalid)?;
        let pair = self.issue(&user.id, user.role)?;
        let entry = self.entry_for(&pair.refresh_token)?;

        // Atomic removal; a replayed token finds nothing to remove
        if !self.revoke(&user.id, refresh_token).await? {
            tracing::warn!(user_id = %user.id, "Refresh token not held by user");
            return Err(invalid());
        }

        if let Err(e) = self.users.push_refresh_token(&user.id, entry, Utc::now()).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to store rotated refresh token");
            let previous = RefreshTokenEntry {
                token_hash: hash_token(refresh_token),
                expires_at: verified.expires_at,
            };
            if let Err(restore) = self
                .users
                .push_refresh_token(&user.id, previous, Utc::now())
                .await
            {
                tracing::error!(user_id = %user.id, error = %restore, "Failed to restore refresh token");
            }
            return Err(e.into());
        }

        Ok((user, pair))
    }
}

/// SHA-256 hex digest of a token
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// 32 random bytes, URL-safe base64 without padding
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
