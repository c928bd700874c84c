//! Authentication service layer
//!
//! Account lifecycle: registration, email verification, login, session
//! refresh/logout, profile updates and password change/reset.

use super::models::{ChangePasswordRequest, LoginRequest, RegisterRequest};
use super::password::{hash_password_blocking, verify_password_blocking, PasswordConfig};
use super::tokens::{generate_opaque_token, hash_token, TokenPair, TokenService};
use crate::audit::{audit_log, AuditEvent, RequestMeta};
use crate::error::AppError;
use crate::notify::Notifier;
use chrono::{Duration, Utc};
use estate_core::{ProfileUpdate, User, UserStore};
use std::sync::Arc;
use uuid::Uuid;

/// Lifetime of a password reset token
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    notifier: Arc<Notifier>,
    password_config: PasswordConfig,
}

fn invalid_credentials() -> AppError {
    AppError::BadRequest("Invalid credentials".to_string())
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<TokenService>,
        notifier: Arc<Notifier>,
        password_config: PasswordConfig,
    ) -> Self {
        Self {
            users,
            tokens,
            notifier,
            password_config,
        }
    }

    async fn hash(&self, password: &str) -> Result<String, AppError> {
        hash_password_blocking(password.to_string(), self.password_config.clone())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        verify_password_blocking(password.to_string(), hash.to_string())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    /// Create an unverified account, open a session and send the
    /// verification email
    pub async fn register(
        &self,
        request: RegisterRequest,
        meta: RequestMeta,
    ) -> Result<(User, TokenPair), AppError> {
        let email = request.email.trim().to_lowercase();

        if self.users.find_user_by_email(&email).await?.is_some() {
            audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: "Email already registered".to_string(),
                meta,
            });
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let mut user = User::new(
            Uuid::new_v4().simple().to_string(),
            request.first_name.trim().to_string(),
            request.last_name.trim().to_string(),
            &email,
            request.phone.trim().to_string(),
            self.hash(&request.password).await?,
        );
        let verification_token = generate_opaque_token();
        user.verification_token = Some(verification_token.clone());

        let user = self.users.insert_user(user).await?;
        let pair = self.tokens.start_session(&user).await?;

        self.notifier.verification(&user, &verification_token).await;

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: user.id.clone(),
            email: user.email.clone(),
            meta,
        });
        tracing::info!(user_id = %user.id, "User registered");

        Ok((user, pair))
    }

    /// Unknown email and wrong password are indistinguishable. A correct
    /// password on an unverified account is refused with 401.
    pub async fn login(
        &self,
        request: LoginRequest,
        meta: RequestMeta,
    ) -> Result<(User, TokenPair), AppError> {
        let email = request.email.trim().to_lowercase();

        let fail = |reason: &str, meta: RequestMeta| {
            audit_log(&AuditEvent::LoginFailure {
                email: email.clone(),
                reason: reason.to_string(),
                meta,
            });
        };

        let Some(user) = self.users.find_user_by_email(&email).await? else {
            fail("Unknown email", meta);
            return Err(invalid_credentials());
        };

        let matches = self.verify(&request.password, &user.password_hash).await?;
        if !matches {
            fail("Wrong password", meta);
            return Err(invalid_credentials());
        }

        if !user.email_verified {
            fail("Email not verified", meta);
            return Err(AppError::Unauthorized("Email not verified".to_string()));
        }

        let pair = self.tokens.start_session(&user).await?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id.clone(),
            email: user.email.clone(),
            meta,
        });

        Ok((user, pair))
    }

    /// Redeem a verification token; a token works exactly once
    pub async fn verify_email(&self, token: &str) -> Result<User, AppError> {
        let user = self
            .users
            .redeem_verification_token(token)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("Invalid or expired verification token".to_string())
            })?;

        audit_log(&AuditEvent::EmailVerified {
            user_id: user.id.clone(),
            email: user.email.clone(),
        });

        Ok(user)
    }

    /// Rotate the presented refresh token into a new pair
    pub async fn refresh(
        &self,
        refresh_token: Option<String>,
        meta: RequestMeta,
    ) -> Result<(User, TokenPair), AppError> {
        let token = refresh_token
            .ok_or_else(|| AppError::BadRequest("Refresh token required".to_string()))?;

        let (user, pair) = self.tokens.rotate(&token).await?;

        audit_log(&AuditEvent::TokenRefresh {
            user_id: user.id.clone(),
            meta,
        });

        Ok((user, pair))
    }

    /// Revoke the presented refresh token if it verifies. Never fails.
    pub async fn logout(&self, refresh_token: &str, meta: RequestMeta) {
        let user_id = match self.tokens.verify_refresh(refresh_token) {
            Ok(verified) => {
                if let Err(e) = self.tokens.revoke(&verified.user_id, refresh_token).await {
                    tracing::warn!(user_id = %verified.user_id, error = %e, "Failed to revoke refresh token");
                }
                Some(verified.user_id)
            }
            Err(_) => None,
        };

        audit_log(&AuditEvent::Logout { user_id, meta });
    }

    pub async fn profile(&self, user_id: &str) -> Result<User, AppError> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or_else(user_not_found)
    }

    pub async fn update_user(&self, user_id: &str, update: ProfileUpdate) -> Result<User, AppError> {
        if update.is_empty() {
            return Err(AppError::BadRequest(
                "Provide at least one of firstName, lastName or phone".to_string(),
            ));
        }

        self.users
            .update_profile(user_id, &update)
            .await?
            .ok_or_else(user_not_found)
    }

    /// Replace the password after checking the current one; ends every session
    pub async fn change_password(
        &self,
        user_id: &str,
        request: ChangePasswordRequest,
        meta: RequestMeta,
    ) -> Result<(), AppError> {
        let user = self.profile(user_id).await?;

        let matches = self
            .verify(&request.old_password, &user.password_hash)
            .await?;
        if !matches {
            return Err(AppError::BadRequest("Current password is incorrect".to_string()));
        }

        let hash = self.hash(&request.new_password).await?;
        self.users.set_password(&user.id, &hash).await?;
        self.tokens.revoke_all(&user.id).await?;

        audit_log(&AuditEvent::PasswordChange {
            user_id: user.id,
            meta,
        });

        Ok(())
    }

    /// Store a hashed, one-hour reset token and email the raw token
    pub async fn forgot_password(&self, email: &str, meta: RequestMeta) -> Result<(), AppError> {
        let user = self
            .users
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("No account with that email".to_string()))?;

        let token = generate_opaque_token();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        self.users
            .set_reset_token(&user.id, &hash_token(&token), expires_at)
            .await?;

        self.notifier.password_reset(&user, &token).await;

        audit_log(&AuditEvent::PasswordResetRequested {
            user_id: user.id.clone(),
            email: user.email.clone(),
            meta,
        });

        Ok(())
    }

    /// Redeem a reset token; a token works once and before it expires.
    /// The new password is only hashed once the token checks out.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        meta: RequestMeta,
    ) -> Result<(), AppError> {
        let invalid = || AppError::BadRequest("Invalid or expired reset token".to_string());
        let token_hash = hash_token(token);

        if self
            .users
            .find_user_by_reset_token(&token_hash, Utc::now())
            .await?
            .is_none()
        {
            return Err(invalid());
        }

        let hash = self.hash(new_password).await?;

        // A concurrent reset can still win between the check and the swap
        let user = self
            .users
            .redeem_reset_token(&token_hash, &hash, Utc::now())
            .await?
            .ok_or_else(invalid)?;

        audit_log(&AuditEvent::PasswordResetCompleted {
            user_id: user.id,
            meta,
        });

        Ok(())
    }
}
