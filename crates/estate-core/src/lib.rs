//! Estate Core - Domain models, traits, and shared types
//!
//! This crate defines the abstractions shared by the listings service:
//! - Users, regions and properties (House/Land tagged union)
//! - Common error types
//! - Storage traits for the credential store and the catalog
//! - Collaborator traits for image storage and email delivery
//! - Configuration management

pub mod config;
pub mod models;

pub use config::{
    parse_duration, AppConfig, ConfigError, DatabaseConfig, Environment, JwtSettings,
    LoggingConfig, MailConfig, ServerConfig, StorageConfig,
};
pub use models::{
    normalize_city, EmailMessage, HouseDetails, ImageUpload, Page, Property, PropertyFilter,
    PropertyKind, PropertyType, ProfileUpdate, Recipient, RefreshTokenEntry, Region, Role, User,
    UserPublic,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for listing operations
#[derive(Error, Debug)]
pub enum EstateError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EstateError>;

// ============================================================================
// Credential Store
// ============================================================================

/// Persistence of user accounts, sessions and favorites.
///
/// Operations documented as atomic must be a single conditional write at
/// the storage layer; callers never re-check the condition in memory.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: User) -> Result<User>;

    async fn find_user(&self, id: &str) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Apply a partial profile update, returning the updated user.
    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Option<User>>;

    /// Replace the password hash. Fails with `NotFound` for unknown users.
    async fn set_password(&self, id: &str, password_hash: &str) -> Result<()>;

    /// Fails with `NotFound` for unknown users.
    async fn set_role(&self, id: &str, role: Role) -> Result<()>;

    /// Atomically mark the owner of `token` verified and clear the token.
    ///
    /// Returns `None` when no user holds the token, which makes the
    /// token single-use.
    async fn redeem_verification_token(&self, token: &str) -> Result<Option<User>>;

    async fn set_reset_token(
        &self,
        id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// The user holding `token_hash` as a reset token that is still valid at `now`
    async fn find_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>>;

    /// Atomically swap the password of the user holding an unexpired reset
    /// token, clearing the reset token and every refresh token.
    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>>;

    /// Append a refresh token entry, pruning entries expired at `now`.
    async fn push_refresh_token(
        &self,
        id: &str,
        entry: RefreshTokenEntry,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Atomically remove a refresh token entry.
    ///
    /// Returns `false` when the user holds no entry with that hash.
    async fn take_refresh_token(&self, id: &str, token_hash: &str) -> Result<bool>;

    async fn clear_refresh_tokens(&self, id: &str) -> Result<()>;

    /// Insert-if-absent on the favorites edge.
    ///
    /// Returns `false` when the edge already exists and `NotFound` when the
    /// user does not.
    async fn add_favorite(&self, user_id: &str, property_id: &str) -> Result<bool>;

    /// Remove-if-present on the favorites edge.
    ///
    /// Returns `false` when the edge did not exist and `NotFound` when the
    /// user does not.
    async fn remove_favorite(&self, user_id: &str, property_id: &str) -> Result<bool>;

    /// Verified, non-admin users that receive listing broadcasts.
    async fn list_broadcast_recipients(&self) -> Result<Vec<Recipient>>;

    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Catalog Store
// ============================================================================

/// Persistence of regions and properties
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fails with `Conflict` when the city is taken.
    async fn insert_region(&self, region: Region) -> Result<Region>;

    async fn find_region(&self, id: &str) -> Result<Option<Region>>;

    async fn list_regions(&self) -> Result<Vec<Region>>;

    /// Overwrite a region. Fails with `Conflict` when the city is taken by
    /// another region and `NotFound` when the region is gone.
    async fn update_region(&self, region: &Region) -> Result<()>;

    async fn delete_region(&self, id: &str) -> Result<Option<Region>>;

    async fn insert_property(&self, property: Property) -> Result<Property>;

    async fn find_property(&self, id: &str) -> Result<Option<Property>>;

    /// Resolve a set of ids, silently skipping the ones that no longer exist.
    async fn find_properties(&self, ids: &[String]) -> Result<Vec<Property>>;

    /// Filtered, paginated listing, newest first.
    async fn search_properties(&self, filter: &PropertyFilter) -> Result<Page<Property>>;

    /// Overwrite a property (last write wins). Fails with `NotFound` when
    /// the property is gone.
    async fn update_property(&self, property: &Property) -> Result<()>;

    async fn delete_property(&self, id: &str) -> Result<Option<Property>>;

    async fn count_properties_in_region(&self, region_id: &str) -> Result<u64>;
}

// ============================================================================
// External collaborators
// ============================================================================

/// Object storage for listing and region images
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload an image, returning its public URL.
    async fn upload(&self, image: ImageUpload) -> Result<String>;

    /// Release a previously uploaded image by its URL.
    async fn delete(&self, url: &str) -> Result<()>;
}

/// Transactional email delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message. A single attempt; no retries.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Outbox(Mutex<Vec<String>>);

    #[async_trait]
    impl Mailer for Outbox {
        async fn send(&self, message: &EmailMessage) -> Result<()> {
            if message.to_email.is_empty() {
                return Err(EstateError::InvalidInput("recipient required".into()));
            }
            self.0.lock().unwrap().push(message.subject.clone());
            Ok(())
        }
    }

    #[test]
    fn test_mailer_behind_trait_object() {
        let outbox = Outbox(Mutex::new(Vec::new()));
        let mailer: &dyn Mailer = &outbox;
        let message = EmailMessage {
            to_email: "a@example.com".into(),
            to_name: None,
            subject: "Hi".into(),
            html: "<p>Hi</p>".into(),
        };

        tokio_test::block_on(mailer.send(&message)).unwrap();

        let nobody = EmailMessage {
            to_email: String::new(),
            ..message
        };
        assert!(matches!(
            tokio_test::block_on(mailer.send(&nobody)),
            Err(EstateError::InvalidInput(_))
        ));
        assert_eq!(*outbox.0.lock().unwrap(), vec!["Hi"]);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EstateError::NotFound("Region r1".into()).to_string(),
            "Not found: Region r1"
        );
        let other: EstateError = anyhow::anyhow!("boom").into();
        assert_eq!(other.to_string(), "boom");
    }
}
